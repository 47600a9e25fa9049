//! Infrastructure output sources
//!
//! Reads the values exported by the provisioning definitions. A source only
//! fetches and parses; lookups on the resulting descriptor fail with
//! "not found" until provisioning has completed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rollout_core::domain::infra::{OutputKey, ResourceDescriptor};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::command::{CommandExecutor, CommandSpec};

/// Somewhere provisioned outputs can be read from
#[async_trait]
pub trait OutputSource: Send + Sync {
    async fn fetch(&self) -> Result<ResourceDescriptor>;
}

/// Outputs read live from the provisioning tool's state
pub struct TerraformOutputs {
    dir: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl TerraformOutputs {
    /// # Arguments
    /// * `dir` - Directory holding the infrastructure definitions
    /// * `executor` - Runs the provisioning CLI
    pub fn new(dir: impl Into<PathBuf>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            dir: dir.into(),
            executor,
        }
    }
}

#[async_trait]
impl OutputSource for TerraformOutputs {
    async fn fetch(&self) -> Result<ResourceDescriptor> {
        let spec = CommandSpec::new("terraform")
            .arg(format!("-chdir={}", self.dir.display()))
            .args(["output", "-json"]);

        debug!("Reading outputs from {}", self.dir.display());

        let output = self
            .executor
            .run(&spec)
            .await
            .context("Failed to run terraform")?;

        if !output.success() {
            anyhow::bail!(
                "terraform output failed (exit code {}): {}",
                output.exit_code,
                output.stderr.trim()
            );
        }

        let document = output.stdout.trim();
        if document.is_empty() {
            return Ok(ResourceDescriptor::default());
        }

        ResourceDescriptor::from_json(document).context("Failed to parse terraform outputs")
    }
}

/// Outputs saved to a file with `terraform output -json > outputs.json`
pub struct OutputsFile {
    path: PathBuf,
}

impl OutputsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OutputSource for OutputsFile {
    async fn fetch(&self) -> Result<ResourceDescriptor> {
        let document = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read outputs file: {}", self.path.display()))?;

        ResourceDescriptor::from_json(&document)
            .with_context(|| format!("Failed to parse outputs file: {}", self.path.display()))
    }
}

/// Fetches the outputs and looks up a single key
pub async fn lookup_output(source: &dyn OutputSource, key: OutputKey) -> Result<String> {
    let descriptor = source.fetch().await?;
    Ok(descriptor.lookup(key)?.to_string())
}
