//! Pipeline context resolution
//!
//! Builds the immutable [`PipelineContext`] once, at the start of a run.
//! Values missing from the configuration are resolved here and nowhere else:
//! the account id from the caller identity, the commit from the workspace.

use anyhow::{Context as AnyhowContext, Result};
use rollout_core::domain::context::PipelineContext;
use tracing::info;

use crate::command::{CommandExecutor, CommandSpec};
use crate::config::{Config, is_account_id};

/// Resolves every context value for a run
pub async fn resolve_context(
    config: &Config,
    executor: &dyn CommandExecutor,
) -> Result<PipelineContext> {
    let account_id = match &config.account_id {
        Some(account_id) => account_id.clone(),
        None => resolve_account_id(executor).await?,
    };

    let commit = match &config.commit {
        Some(commit) => commit.clone(),
        None => resolve_commit(config, executor).await?,
    };

    let context = PipelineContext {
        account_id,
        region: config.region.clone(),
        repository: config.repository.clone(),
        image_tag: config.build_number.clone(),
        commit,
        branch: config.branch.clone(),
        cluster_name: config.cluster_name.clone(),
        namespace: config.namespace.clone(),
        deployment: config.deployment.clone(),
        container: config.container.clone(),
        service: config.service.clone(),
        workspace: config.workspace.clone(),
        manifests_dir: config.manifests_dir.clone(),
        project_key: config.project_key().to_string(),
    };

    info!(
        "Resolved context: image={} commit={} branch={}",
        context.image_reference(),
        context.short_commit(),
        context.branch
    );

    Ok(context)
}

/// Asks the identity service which account the credentials belong to
async fn resolve_account_id(executor: &dyn CommandExecutor) -> Result<String> {
    let spec = CommandSpec::new("aws").args([
        "sts",
        "get-caller-identity",
        "--query",
        "Account",
        "--output",
        "text",
    ]);

    let output = executor
        .run(&spec)
        .await
        .context("Failed to query caller identity")?;

    if !output.success() {
        anyhow::bail!(
            "Caller identity lookup failed (exit code {}): {}",
            output.exit_code,
            output.stderr.trim()
        );
    }

    let account_id = output.stdout.trim().to_string();
    if !is_account_id(&account_id) {
        anyhow::bail!("Caller identity returned an invalid account id '{}'", account_id);
    }

    Ok(account_id)
}

/// Reads the commit checked out in the workspace
async fn resolve_commit(config: &Config, executor: &dyn CommandExecutor) -> Result<String> {
    let spec = CommandSpec::new("git")
        .arg("-C")
        .arg(config.workspace.to_string_lossy())
        .args(["rev-parse", "HEAD"]);

    let output = executor
        .run(&spec)
        .await
        .context("Failed to read workspace HEAD")?;

    if !output.success() {
        anyhow::bail!(
            "Could not resolve commit in {}: {}",
            config.workspace.display(),
            output.stderr.trim()
        );
    }

    Ok(output.stdout.trim().to_string())
}
