//! Pipeline runner
//!
//! Executes the fixed stage sequence against one resolved context:
//! - The context is resolved first; a run that cannot start is aborted
//! - Stages run strictly in declaration order, one at a time
//! - The first blocking failure skips every remaining stage
//! - On success the application URL is reported
//! - On failure a single failure banner is reported
//! - Local image cleanup runs exactly once, whatever the outcome

use chrono::Utc;
use colored::*;
use rollout_core::domain::context::PipelineContext;
use rollout_core::domain::run::{RunOutcome, RunReport};
use rollout_core::domain::stage::{StageFailure, StageName, StageRecord, StageStatus};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::command::{CommandExecutor, CommandSpec};
use crate::config::Config;
use crate::context::resolve_context;
use crate::log_buffer::RunLog;
use crate::quality_gate::QualityGate;
use crate::stages::{StageEnv, access_url, run_stage};

pub const FAILURE_BANNER: &str = "Pipeline failed!";

/// Runs the deployment pipeline
pub struct PipelineRunner {
    config: Config,
    executor: Arc<dyn CommandExecutor>,
    gate: Arc<dyn QualityGate>,
    /// Print stage progress to stdout
    echo: bool,
}

impl PipelineRunner {
    /// Creates a new pipeline runner
    ///
    /// # Arguments
    /// * `config` - Validated runner configuration
    /// * `executor` - Runs external commands
    /// * `gate` - Code-quality server access for the quality gate
    pub fn new(
        config: Config,
        executor: Arc<dyn CommandExecutor>,
        gate: Arc<dyn QualityGate>,
    ) -> Self {
        Self {
            config,
            executor,
            gate,
            echo: true,
        }
    }

    /// Disables human-readable progress output (e.g. for JSON reports)
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Validates the configuration, resolves the context and runs the pipeline
    ///
    /// A failure before the first stage still reports the failure banner and
    /// runs cleanup once.
    pub async fn execute(&self) -> RunReport {
        let started_at = Utc::now();

        let resolved = match self.config.validate() {
            Ok(()) => resolve_context(&self.config, self.executor.as_ref()).await,
            Err(e) => Err(e.context("Invalid configuration")),
        };

        match resolved {
            Ok(ctx) => self.run(&ctx).await,
            Err(e) => self.abort(started_at, e).await,
        }
    }

    /// Runs every stage against `ctx` and reports the outcome once
    pub async fn run(&self, ctx: &PipelineContext) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let log = RunLog::new();
        let env = StageEnv {
            config: &self.config,
            executor: self.executor.as_ref(),
            gate: self.gate.as_ref(),
            log: &log,
        };

        info!("Starting run {} for {}", run_id, ctx.image_reference());
        if self.echo {
            println!("{} {}", "Deploying".bold(), ctx.image_reference().cyan());
            println!();
        }
        log.info(format!(
            "Deploying {} ({} @ {})",
            ctx.image_reference(),
            ctx.branch,
            ctx.short_commit()
        ));

        let mut records = Vec::with_capacity(StageName::ALL.len());
        let mut failure: Option<(StageName, StageFailure)> = None;

        for stage in StageName::ALL {
            if failure.is_some() {
                records.push(StageRecord::skipped(stage));
                continue;
            }

            let (record, reason) = self.run_one(stage, ctx, &env).await;
            if let Some(reason) = reason {
                failure = Some((stage, reason));
            }
            records.push(record);
        }

        let outcome = match failure {
            None => RunOutcome::Succeeded,
            Some((stage, reason)) => RunOutcome::Failed { stage, reason },
        };

        let access_url = match &outcome {
            RunOutcome::Succeeded => self.notify_success(ctx, &env).await,
            RunOutcome::Failed { stage, reason } => {
                self.notify_failure(stage.as_str(), reason, &log);
                None
            }
            RunOutcome::Aborted { reason } => {
                self.notify_failure("(setup)", reason, &log);
                None
            }
        };

        self.cleanup(
            vec![
                ctx.local_image(),
                ctx.image_reference(),
                ctx.latest_reference(),
            ],
            &env,
        )
        .await;

        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            image: ctx.image_reference(),
            stages: records,
            outcome,
            access_url,
            logs: log.drain(),
        }
    }

    /// Runs one stage; a blocking failure is returned alongside its record
    async fn run_one(
        &self,
        stage: StageName,
        ctx: &PipelineContext,
        env: &StageEnv<'_>,
    ) -> (StageRecord, Option<StageFailure>) {
        if self.echo {
            println!(
                "{} {}",
                format!("[{}/{}]", stage.position(), StageName::ALL.len()).dimmed(),
                stage.as_str().bold()
            );
        }
        env.log.info(format!("Starting stage: {}", stage));

        let started_at = Utc::now();
        let result = run_stage(stage, ctx, env).await;
        let finished_at = Some(Utc::now());

        match result {
            Ok(()) => {
                let record = StageRecord {
                    name: stage,
                    status: StageStatus::Succeeded,
                    started_at: Some(started_at),
                    finished_at,
                    message: None,
                };
                env.log.info(format!(
                    "Stage '{}' completed in {} ms",
                    stage,
                    record.duration_ms().unwrap_or_default()
                ));
                (record, None)
            }
            Err(reason) if !self.config.is_blocking(stage) => {
                env.log
                    .warning(format!("Stage '{}' failed (non-blocking): {}", stage, reason));
                if self.echo {
                    println!("  {} {}", "⚠".yellow(), reason.to_string().yellow());
                }
                (
                    StageRecord {
                        name: stage,
                        status: StageStatus::Warned,
                        started_at: Some(started_at),
                        finished_at,
                        message: Some(reason.to_string()),
                    },
                    None,
                )
            }
            Err(reason) => {
                env.log.error(format!("Stage '{}' failed: {}", stage, reason));
                (
                    StageRecord {
                        name: stage,
                        status: StageStatus::Failed,
                        started_at: Some(started_at),
                        finished_at,
                        message: Some(reason.to_string()),
                    },
                    Some(reason),
                )
            }
        }
    }

    /// Resolves and reports the application URL
    ///
    /// The run has already succeeded; a missing address is only reported.
    async fn notify_success(&self, ctx: &PipelineContext, env: &StageEnv<'_>) -> Option<String> {
        let url = match access_url(ctx, env).await {
            Ok(url) => url,
            Err(e) => {
                env.log
                    .warning(format!("Could not read load balancer address: {}", e));
                None
            }
        };

        match &url {
            Some(url) => {
                env.log.info(format!("Application URL: {}", url));
                if self.echo {
                    println!("{}", "✓ Deployment succeeded!".green().bold());
                    println!("  Application URL: {}", url.cyan());
                }
            }
            None => {
                env.log
                    .warning("Load balancer address is still pending".to_string());
                if self.echo {
                    println!("{}", "✓ Deployment succeeded!".green().bold());
                    println!("  Application URL: {}", "pending".yellow());
                }
            }
        }

        url
    }

    /// Reports a run that failed before its first stage
    ///
    /// Only the local image name is known without a context, so that is all
    /// cleanup removes.
    async fn abort(&self, started_at: chrono::DateTime<Utc>, error: anyhow::Error) -> RunReport {
        let log = RunLog::new();
        let env = StageEnv {
            config: &self.config,
            executor: self.executor.as_ref(),
            gate: self.gate.as_ref(),
            log: &log,
        };

        let reason = format!("{:#}", error);
        log.error(format!("Run could not start: {}", reason));
        self.notify_failure("(setup)", &reason, &log);

        let local_image = format!("{}:{}", self.config.repository, self.config.build_number);
        self.cleanup(vec![local_image.clone()], &env).await;

        RunReport {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            image: local_image,
            stages: StageName::ALL.map(StageRecord::skipped).to_vec(),
            outcome: RunOutcome::Aborted { reason },
            access_url: None,
            logs: log.drain(),
        }
    }

    fn notify_failure(&self, stage: &str, reason: &dyn fmt::Display, log: &RunLog) {
        log.error(FAILURE_BANNER);
        if self.echo {
            println!("{}", format!("✗ {}", FAILURE_BANNER).red().bold());
            println!("  Stage:  {}", stage.bold());
            println!("  Reason: {}", reason);
        }
    }

    /// Removes the images built by this run; failures are only logged
    async fn cleanup(&self, images: Vec<String>, env: &StageEnv<'_>) {
        let spec = CommandSpec::new("docker").arg("rmi").args(images);

        match env.run_unchecked(&spec).await {
            Ok(output) if output.success() => env.log.info("Cleanup complete".to_string()),
            Ok(output) => {
                warn!("Cleanup failed: {}", output.stderr.trim());
                env.log.warning(format!(
                    "Cleanup failed (ignored): {}",
                    output.stderr.trim()
                ));
            }
            Err(e) => {
                warn!("Cleanup failed: {}", e);
                env.log.warning(format!("Cleanup failed (ignored): {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::tests::context;
    use crate::testing::{FakeGate, ScriptedExecutor, workspace_with_report};
    use std::path::Path;

    fn runner(executor: Arc<ScriptedExecutor>, gate: FakeGate) -> PipelineRunner {
        PipelineRunner::new(Config::default(), executor, Arc::new(gate)).quiet()
    }

    fn ctx_in(workspace: &Path) -> PipelineContext {
        PipelineContext {
            workspace: workspace.to_path_buf(),
            ..context()
        }
    }

    #[tokio::test]
    async fn test_successful_run_executes_every_stage_in_order() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.respond("kubectl", &["-n", "web", "get", "svc", "my-website-service", "-o"], "abc.elb.amazonaws.com");

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&ctx_in(workspace.path()))
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.executed().collect::<Vec<_>>(), StageName::ALL.to_vec());
        assert_eq!(report.access_url.as_deref(), Some("http://abc.elb.amazonaws.com"));
        assert_eq!(executor.count("docker", &["rmi"]), 1);
        assert!(report
            .logs
            .iter()
            .any(|entry| entry.message.starts_with("Stage 'Deploy' completed in ")));

        // Commands appear in stage order
        let lines = executor.lines();
        let position = |needle: &str| lines.iter().position(|l| l.contains(needle)).unwrap();
        assert!(position("git -C") < position("sonar-scanner"));
        assert!(position("sonar-scanner") < position("docker build"));
        assert!(position("docker build") < position("trivy image"));
        assert!(position("trivy image") < position("docker push"));
        assert!(position("docker push") < position("update-kubeconfig"));
        assert!(position("update-kubeconfig") < position("set image"));
        assert!(position("set image") < position("rollout status"));
        assert!(position("rollout status") < position("docker rmi"));
    }

    #[tokio::test]
    async fn test_failure_skips_remaining_stages() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("docker", &["build"], 1, "failed to solve");

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&ctx_in(workspace.path()))
            .await;

        assert_eq!(
            report.outcome,
            RunOutcome::Failed {
                stage: StageName::BuildImage,
                reason: StageFailure::CommandFailed {
                    program: "docker".to_string(),
                    exit_code: 1,
                    stderr: "failed to solve".to_string(),
                },
            }
        );
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.executed().collect::<Vec<_>>(),
            vec![
                StageName::Checkout,
                StageName::StaticAnalysis,
                StageName::QualityGate,
                StageName::BuildImage,
            ]
        );
        for stage in &StageName::ALL[4..] {
            assert_eq!(report.record(*stage).unwrap().status, StageStatus::Skipped);
        }

        assert_eq!(executor.count("trivy", &[]), 0);
        assert_eq!(executor.count("docker", &["push"]), 0);
        assert_eq!(executor.count("kubectl", &[]), 0);
        assert!(report.logs.iter().any(|entry| entry.message == FAILURE_BANNER));
        assert!(report.access_url.is_none());

        // Cleanup still runs, exactly once
        assert_eq!(executor.count("docker", &["rmi"]), 1);
    }

    #[tokio::test]
    async fn test_first_stage_failure_runs_nothing_else() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("git", &[], 128, "fatal: not a git repository");

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&context())
            .await;

        assert_eq!(report.executed().collect::<Vec<_>>(), vec![StageName::Checkout]);
        assert_eq!(executor.count("sonar-scanner", &[]), 0);
        assert_eq!(executor.calls().len(), 2); // failed git fetch + cleanup
        assert_eq!(executor.count("docker", &["rmi"]), 1);
    }

    #[tokio::test]
    async fn test_non_blocking_scan_failure_continues() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.spawn_error("trivy");

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&ctx_in(workspace.path()))
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(
            report.record(StageName::VulnerabilityScan).unwrap().status,
            StageStatus::Warned
        );
        assert_eq!(
            report.record(StageName::VerifyDeployment).unwrap().status,
            StageStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_blocking_scan_failure_stops_run() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("trivy", &[], 1, "CRITICAL: 3");

        let config = Config {
            scan_blocking: true,
            ..Config::default()
        };
        let report = PipelineRunner::new(config, executor.clone(), Arc::new(FakeGate::passing()))
            .quiet()
            .run(&ctx_in(workspace.path()))
            .await;

        assert!(matches!(
            report.outcome,
            RunOutcome::Failed {
                stage: StageName::VulnerabilityScan,
                ..
            }
        ));
        assert_eq!(executor.count("docker", &["push"]), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_gate_timeout_aborts_run() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        let gate = FakeGate::new(
            &[rollout_sonar::CeTaskStatus::Pending],
            rollout_sonar::QualityGateStatus::Ok,
        );

        let report = runner(executor.clone(), gate).run(&ctx_in(workspace.path())).await;

        match &report.outcome {
            RunOutcome::Failed { stage, reason } => {
                assert_eq!(*stage, StageName::QualityGate);
                assert!(reason.is_timeout());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(executor.count("docker", &["build"]), 0);
        assert_eq!(executor.count("docker", &["rmi"]), 1);
    }

    #[tokio::test]
    async fn test_report_serializes_failed_outcome() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("git", &[], 128, "fatal: bad revision");

        let report = runner(executor, FakeGate::passing()).run(&context()).await;
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["outcome"]["result"], "failed");
        assert_eq!(value["outcome"]["stage"], "Checkout");
        assert_eq!(value["stages"].as_array().unwrap().len(), 9);
        assert!(value["access_url"].is_null());
    }

    #[tokio::test]
    async fn test_identity_failure_aborts_with_banner_and_cleanup() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("aws", &["sts"], 255, "Unable to locate credentials");

        let report = runner(executor.clone(), FakeGate::passing()).execute().await;

        match &report.outcome {
            RunOutcome::Aborted { reason } => {
                assert!(reason.contains("Unable to locate credentials"))
            }
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.executed().count(), 0);
        assert!(report.logs.iter().any(|entry| entry.message == FAILURE_BANNER));

        assert_eq!(executor.count("git", &[]), 0);
        assert_eq!(executor.count("docker", &["rmi", "my-website:local"]), 1);
        assert_eq!(executor.calls().len(), 2); // identity lookup + cleanup
    }

    #[tokio::test]
    async fn test_invalid_config_aborts_before_any_lookup() {
        let executor = Arc::new(ScriptedExecutor::new());
        let config = Config {
            account_id: Some("12345".to_string()),
            ..Config::default()
        };

        let report = PipelineRunner::new(config, executor.clone(), Arc::new(FakeGate::passing()))
            .quiet()
            .execute()
            .await;

        assert!(matches!(report.outcome, RunOutcome::Aborted { .. }));
        assert!(report.logs.iter().any(|entry| entry.message == FAILURE_BANNER));
        assert_eq!(executor.count("aws", &[]), 0);
        assert_eq!(executor.count("docker", &["rmi"]), 1);
    }

    #[tokio::test]
    async fn test_execute_resolves_context_then_runs() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.respond("aws", &["sts"], "111111111111\n");
        let config = Config {
            build_number: "42".to_string(),
            commit: Some("0123456789abcdef".to_string()),
            workspace: workspace.path().to_path_buf(),
            ..Config::default()
        };

        let report = PipelineRunner::new(config, executor.clone(), Arc::new(FakeGate::passing()))
            .quiet()
            .execute()
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(
            report.image,
            "111111111111.dkr.ecr.us-east-1.amazonaws.com/my-website:42"
        );
        assert_eq!(executor.count("docker", &["rmi", "my-website:42"]), 1);
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_suppressed() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());
        executor.fail("docker", &["rmi"], 1, "No such image");

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&ctx_in(workspace.path()))
            .await;

        assert!(report.outcome.is_success());
        assert!(report
            .logs
            .iter()
            .any(|entry| entry.message.contains("Cleanup failed (ignored)")));
    }

    #[tokio::test]
    async fn test_pending_address_does_not_fail_run() {
        let workspace = workspace_with_report();
        let executor = Arc::new(ScriptedExecutor::new());

        let report = runner(executor.clone(), FakeGate::passing())
            .run(&ctx_in(workspace.path()))
            .await;

        assert!(report.outcome.is_success());
        assert!(report.access_url.is_none());
    }
}
