//! Source stages: checkout, static analysis and the quality gate

use rollout_core::domain::context::PipelineContext;
use rollout_core::domain::stage::StageFailure;
use rollout_sonar::{REPORT_TASK_PATH, ReportTask};

use super::StageEnv;
use crate::command::CommandSpec;
use crate::quality_gate::wait_for_quality_gate;

fn git(ctx: &PipelineContext) -> CommandSpec {
    CommandSpec::new("git")
        .arg("-C")
        .arg(ctx.workspace.to_string_lossy())
}

/// Brings the workspace to the commit being deployed
pub async fn checkout(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    env.run(git(ctx).args(["fetch", "--prune", "origin", ctx.branch.as_str()]))
        .await?;
    env.run(git(ctx).args(["checkout", "--force", ctx.commit.as_str()]))
        .await?;

    let head = env
        .run(git(ctx).args(["log", "-1", "--format=%h %s"]))
        .await?;
    env.log.info(format!("Checked out {}", head.stdout.trim()));

    Ok(())
}

/// Uploads an analysis of the workspace to the code-quality server
pub async fn static_analysis(
    ctx: &PipelineContext,
    env: &StageEnv<'_>,
) -> Result<(), StageFailure> {
    let mut spec = CommandSpec::new("sonar-scanner")
        .arg(format!("-Dsonar.projectKey={}", ctx.project_key))
        .arg(format!("-Dsonar.projectVersion={}", ctx.image_tag))
        .arg("-Dsonar.sources=.")
        .arg(format!("-Dsonar.host.url={}", env.config.sonar_host_url))
        .cwd(&ctx.workspace);

    // The token goes through the environment so it never shows up in argv
    if let Some(token) = &env.config.sonar_token {
        spec = spec.env("SONAR_TOKEN", token.as_str());
    }

    env.run(spec).await?;
    Ok(())
}

/// Waits, bounded, for the verdict on the analysis just uploaded
pub async fn quality_gate(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    let report_path = ctx.workspace.join(REPORT_TASK_PATH);
    let text = tokio::fs::read_to_string(&report_path)
        .await
        .map_err(|e| StageFailure::Io(format!("{}: {}", report_path.display(), e)))?;

    let report = ReportTask::parse(&text).map_err(|e| StageFailure::QualityGate(e.to_string()))?;

    env.log.info(format!(
        "Waiting up to {}s for quality gate of task {}",
        env.config.quality_gate_timeout.as_secs(),
        report.ce_task_id
    ));

    let status = wait_for_quality_gate(
        env.gate,
        &report.ce_task_id,
        env.config.quality_gate_timeout,
        env.config.quality_gate_poll,
    )
    .await?;

    env.log.info(format!("Quality gate passed ({})", status.status));
    if let Some(url) = report.dashboard_url {
        env.log.info(format!("Analysis: {}", url));
    }

    Ok(())
}
