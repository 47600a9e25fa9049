//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod context;
mod outputs;
mod run;
mod stages;

pub use outputs::OutputsArgs;
pub use run::PipelineArgs;

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline
    Run {
        #[command(flatten)]
        args: PipelineArgs,

        /// Print the run report as JSON instead of progress output
        #[arg(long)]
        json: bool,
    },
    /// List the pipeline stages in execution order
    Stages {
        #[command(flatten)]
        args: PipelineArgs,
    },
    /// Resolve and print the pipeline context
    Context {
        #[command(flatten)]
        args: PipelineArgs,

        /// Print the context as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read infrastructure outputs
    Outputs(OutputsArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Returns
/// The process exit code; errors are reported by the caller
pub async fn handle_command(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Run { args, json } => run::handle_run(args, json).await,
        Commands::Stages { args } => stages::handle_stages(args),
        Commands::Context { args, json } => context::handle_context(args, json).await,
        Commands::Outputs(args) => outputs::handle_outputs(args).await,
    }
}
