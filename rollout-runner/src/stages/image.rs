//! Image stages: build, vulnerability scan and push

use rollout_core::domain::context::PipelineContext;
use rollout_core::domain::stage::StageFailure;

use super::StageEnv;
use crate::command::CommandSpec;

pub async fn build(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    let spec = CommandSpec::new("docker")
        .arg("build")
        .args(["-t", ctx.local_image().as_str()])
        .args(["-t", ctx.image_reference().as_str()])
        .args(["-t", ctx.latest_reference().as_str()])
        .arg("--label")
        .arg(format!("org.opencontainers.image.revision={}", ctx.commit))
        .arg(".")
        .cwd(&ctx.workspace);

    env.run(spec).await?;
    env.log.info(format!("Built {}", ctx.image_reference()));
    Ok(())
}

/// Scans the built image for HIGH and CRITICAL findings
///
/// The scanner is told to exit 0 on findings unless the scan is configured
/// as blocking.
pub async fn scan(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    let exit_code = if env.config.scan_blocking { "1" } else { "0" };

    let spec = CommandSpec::new("trivy")
        .arg("image")
        .args(["--exit-code", exit_code])
        .args(["--severity", env.config.scan_severity.as_str()])
        .arg("--no-progress")
        .arg(ctx.image_reference());

    let output = env.run(spec).await?;
    for line in output.stdout.lines().filter(|line| line.starts_with("Total:")) {
        env.log.info(format!("Scan: {}", line.trim()));
    }
    Ok(())
}

/// Logs in to the registry and pushes the build and `latest` tags
pub async fn push(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    let password = env
        .run(
            CommandSpec::new("aws")
                .args(["ecr", "get-login-password", "--region", ctx.region.as_str()])
                .secret(),
        )
        .await?;

    env.run(
        CommandSpec::new("docker")
            .args(["login", "--username", "AWS", "--password-stdin"])
            .arg(ctx.registry())
            .stdin(password.stdout.trim())
            .secret(),
    )
    .await?;

    env.run(CommandSpec::new("docker").arg("push").arg(ctx.image_reference()))
        .await?;
    env.run(CommandSpec::new("docker").arg("push").arg(ctx.latest_reference()))
        .await?;

    env.log.info(format!("Pushed {}", ctx.image_reference()));
    Ok(())
}
