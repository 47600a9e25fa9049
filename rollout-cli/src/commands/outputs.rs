//! Outputs command handler
//!
//! Reads the values exported by the infrastructure definitions, either live
//! from terraform state or from a saved `terraform output -json` document.

use anyhow::Result;
use clap::Args;
use colored::*;
use rollout_core::domain::infra::OutputKey;
use rollout_runner::ProcessExecutor;
use rollout_runner::infra::{OutputSource, OutputsFile, TerraformOutputs, lookup_output};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Output to print (e.g. cluster_name); all outputs when omitted
    pub key: Option<OutputKey>,

    /// Directory holding the terraform configuration
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    pub terraform_dir: Option<PathBuf>,

    /// Saved `terraform output -json` document
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl OutputsArgs {
    fn source(&self) -> Result<Box<dyn OutputSource>> {
        match (&self.file, &self.terraform_dir) {
            (Some(path), _) => Ok(Box::new(OutputsFile::new(path))),
            (None, Some(dir)) => Ok(Box::new(TerraformOutputs::new(
                dir,
                Arc::new(ProcessExecutor::new()),
            ))),
            (None, None) => anyhow::bail!("either --terraform-dir or --file is required"),
        }
    }
}

pub async fn handle_outputs(args: OutputsArgs) -> Result<ExitCode> {
    let source = args.source()?;

    match args.key {
        Some(key) => {
            let value = lookup_output(source.as_ref(), key).await?;
            println!("{}", value);
        }
        None => {
            let descriptor = source.fetch().await?;
            if descriptor.is_empty() {
                println!(
                    "{}",
                    "No outputs found. Has the infrastructure been applied?".yellow()
                );
                return Ok(ExitCode::FAILURE);
            }
            for (key, value) in descriptor.iter() {
                println!("  {:<20} {}", key.as_str().bold(), value.display());
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
