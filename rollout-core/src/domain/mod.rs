//! Core domain types
//!
//! These types are shared between the runner (which executes stages and
//! resolves infrastructure outputs) and the CLI (which displays them).

pub mod context;
pub mod infra;
pub mod log;
pub mod run;
pub mod stage;
