//! Stage bodies
//!
//! Each stage turns the read-only [`PipelineContext`] into a short, fixed
//! sequence of external commands and reports an explicit
//! `Result<(), StageFailure>`. Stages do not decide ordering or whether the
//! run continues; the pipeline runner does.

mod cluster;
mod image;
mod source;

pub(crate) use cluster::access_url;

use rollout_core::domain::context::PipelineContext;
use rollout_core::domain::stage::{StageFailure, StageName};

use crate::command::{CommandExecutor, CommandOutput, CommandSpec, ExecError};
use crate::config::Config;
use crate::log_buffer::RunLog;
use crate::quality_gate::QualityGate;

/// Number of trailing stderr lines kept in a failure reason
const STDERR_TAIL_LINES: usize = 20;

/// Collaborators available to every stage
pub struct StageEnv<'a> {
    pub config: &'a Config,
    pub executor: &'a dyn CommandExecutor,
    pub gate: &'a dyn QualityGate,
    pub log: &'a RunLog,
}

impl StageEnv<'_> {
    /// Runs a command; a non-zero exit fails the stage
    pub(crate) async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, StageFailure> {
        let output = self.run_unchecked(&spec).await?;

        if !output.success() {
            return Err(StageFailure::CommandFailed {
                program: spec.program,
                exit_code: output.exit_code,
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(output)
    }

    /// Runs a command and returns its output whatever the exit code
    pub(crate) async fn run_unchecked(
        &self,
        spec: &CommandSpec,
    ) -> Result<CommandOutput, StageFailure> {
        if spec.secret {
            self.log.info(format!("$ {} (output hidden)", spec));
        } else {
            self.log.info(format!("$ {}", spec));
        }

        let output = self.executor.run(spec).await.map_err(|e| match e {
            ExecError::Spawn { program, source } => StageFailure::Spawn {
                program,
                message: source.to_string(),
            },
            ExecError::Io { program, source } => {
                StageFailure::Io(format!("{}: {}", program, source))
            }
        })?;

        if !spec.secret {
            for line in output.stdout.lines().filter(|line| !line.trim().is_empty()) {
                self.log.debug(line.to_string());
            }
        }

        Ok(output)
    }
}

/// Runs the body of `stage`
pub async fn run_stage(
    stage: StageName,
    ctx: &PipelineContext,
    env: &StageEnv<'_>,
) -> Result<(), StageFailure> {
    match stage {
        StageName::Checkout => source::checkout(ctx, env).await,
        StageName::StaticAnalysis => source::static_analysis(ctx, env).await,
        StageName::QualityGate => source::quality_gate(ctx, env).await,
        StageName::BuildImage => image::build(ctx, env).await,
        StageName::VulnerabilityScan => image::scan(ctx, env).await,
        StageName::PushImage => image::push(ctx, env).await,
        StageName::UpdateKubeconfig => cluster::update_kubeconfig(ctx, env).await,
        StageName::Deploy => cluster::deploy(ctx, env).await,
        StageName::VerifyDeployment => cluster::verify(ctx, env).await,
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
