//! Cluster stages: kubeconfig, deploy and rollout verification

use rollout_core::domain::context::PipelineContext;
use rollout_core::domain::stage::StageFailure;

use super::StageEnv;
use crate::command::CommandSpec;

fn kubectl(ctx: &PipelineContext) -> CommandSpec {
    CommandSpec::new("kubectl").args(["-n", ctx.namespace.as_str()])
}

pub async fn update_kubeconfig(
    ctx: &PipelineContext,
    env: &StageEnv<'_>,
) -> Result<(), StageFailure> {
    env.run(CommandSpec::new("aws").args([
        "eks",
        "update-kubeconfig",
        "--region",
        ctx.region.as_str(),
        "--name",
        ctx.cluster_name.as_str(),
    ]))
    .await?;
    Ok(())
}

/// Applies manifests (when configured) and points the deployment at the new image
pub async fn deploy(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    if let Some(dir) = &ctx.manifests_dir {
        env.run(
            kubectl(ctx)
                .args(["apply", "-f"])
                .arg(dir.to_string_lossy()),
        )
        .await?;
    }

    env.run(
        kubectl(ctx)
            .args(["set", "image"])
            .arg(ctx.deployment_ref())
            .arg(format!("{}={}", ctx.container, ctx.image_reference())),
    )
    .await?;

    env.log.info(format!(
        "Deployment {} updated to {}",
        ctx.deployment,
        ctx.image_reference()
    ));
    Ok(())
}

/// Waits for the rollout to finish and records what is running
pub async fn verify(ctx: &PipelineContext, env: &StageEnv<'_>) -> Result<(), StageFailure> {
    env.run(
        kubectl(ctx)
            .args(["rollout", "status"])
            .arg(ctx.deployment_ref()),
    )
    .await?;

    let pods = env
        .run(
            kubectl(ctx)
                .args(["get", "pods", "-l"])
                .arg(format!("app={}", ctx.deployment)),
        )
        .await?;
    for line in pods.stdout.lines().filter(|line| !line.trim().is_empty()) {
        env.log.info(line.to_string());
    }

    env.run(kubectl(ctx).args(["get", "svc", ctx.service.as_str()]))
        .await?;
    Ok(())
}

/// Reads the load balancer address of the service
///
/// Returns `None` while the address is still being provisioned.
pub(crate) async fn access_url(
    ctx: &PipelineContext,
    env: &StageEnv<'_>,
) -> Result<Option<String>, StageFailure> {
    for field in ["hostname", "ip"] {
        let output = env
            .run(
                kubectl(ctx)
                    .args(["get", "svc", ctx.service.as_str(), "-o"])
                    .arg(format!(
                        "jsonpath={{.status.loadBalancer.ingress[0].{}}}",
                        field
                    )),
            )
            .await?;

        let address = output.stdout.trim();
        if !address.is_empty() {
            return Ok(Some(format!("http://{}", address)));
        }
    }

    Ok(None)
}
