//! Context command handler
//!
//! Resolves the pipeline context exactly as a run would, without executing
//! any stage.

use anyhow::{Context, Result};
use colored::*;
use rollout_core::domain::context::PipelineContext;
use rollout_runner::{ProcessExecutor, resolve_context};
use std::process::ExitCode;

use super::PipelineArgs;

pub async fn handle_context(args: PipelineArgs, json: bool) -> Result<ExitCode> {
    let config = args.into_config();
    config.validate().context("Invalid configuration")?;
    let executor = ProcessExecutor::new();

    let ctx = resolve_context(&config, &executor)
        .await
        .context("Failed to resolve pipeline context")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else {
        print_context(&ctx);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_context(ctx: &PipelineContext) {
    println!("{}", "Pipeline context:".bold());
    println!();
    println!("  Image:       {}", ctx.image_reference().cyan());
    println!("  Registry:    {}", ctx.registry());
    println!("  Commit:      {} ({})", ctx.short_commit(), ctx.branch);
    println!("  Cluster:     {} ({})", ctx.cluster_name, ctx.region);
    println!(
        "  Deployment:  {}/{} container={}",
        ctx.namespace, ctx.deployment, ctx.container
    );
    println!("  Service:     {}", ctx.service);
    println!("  Project key: {}", ctx.project_key);
    println!(
        "  Workspace:   {}",
        ctx.workspace.display().to_string().dimmed()
    );
    if let Some(dir) = &ctx.manifests_dir {
        println!("  Manifests:   {}", dir.display().to_string().dimmed());
    }
}
