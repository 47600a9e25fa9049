//! Rollout Runner
//!
//! Executes the container deployment pipeline on the local machine.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Context: Resolve account, commit and image coordinates once per run
//! - Commands: Run external tools through a swappable executor
//! - Stages: Nine fixed stage bodies, each returning an explicit result
//! - Pipeline: Sequential execution, failure handling and cleanup
//!
//! Infrastructure outputs can be read back from terraform state or a saved
//! outputs file independently of a run.

pub mod command;
pub mod config;
pub mod context;
pub mod infra;
pub mod log_buffer;
pub mod pipeline;
pub mod quality_gate;
pub mod stages;

#[cfg(test)]
mod testing;

pub use command::{CommandExecutor, ProcessExecutor};
pub use config::Config;
pub use context::resolve_context;
pub use pipeline::PipelineRunner;
pub use quality_gate::QualityGate;
