//! Run command handler
//!
//! Builds the runner configuration from flags and environment and executes
//! the pipeline. Context resolution happens inside the run so that a run that
//! cannot start is still reported and cleaned up.

use anyhow::Result;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Args};
use rollout_runner::{Config, PipelineRunner, ProcessExecutor};
use rollout_sonar::SonarClient;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Pipeline inputs; every flag falls back to an environment variable
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Resolved from the caller identity when not given
    #[arg(long, env = "AWS_ACCOUNT_ID")]
    pub account_id: Option<String>,

    #[arg(long, env = "ECR_REPOSITORY", default_value = "my-website")]
    pub repository: String,

    #[arg(long, env = "EKS_CLUSTER_NAME", default_value = "my-eks-cluster")]
    pub cluster_name: String,

    #[arg(long, env = "K8S_NAMESPACE", default_value = "default")]
    pub namespace: String,

    #[arg(long, env = "DEPLOYMENT_NAME", default_value = "my-website")]
    pub deployment: String,

    #[arg(long, env = "CONTAINER_NAME", default_value = "my-website")]
    pub container: String,

    #[arg(long, env = "SERVICE_NAME", default_value = "my-website-service")]
    pub service: String,

    /// Image tag for this build
    #[arg(long, env = "BUILD_NUMBER", default_value = "local")]
    pub build_number: String,

    /// Read from the workspace HEAD when not given
    #[arg(long, env = "GIT_COMMIT")]
    pub commit: Option<String>,

    #[arg(long, env = "GIT_BRANCH", default_value = "main")]
    pub branch: String,

    #[arg(long, env = "WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Manifests applied before the image update
    #[arg(long, env = "MANIFESTS_DIR")]
    pub manifests_dir: Option<PathBuf>,

    #[arg(long, env = "SONAR_HOST_URL", default_value = "http://localhost:9000")]
    pub sonar_host_url: String,

    #[arg(long, env = "SONAR_TOKEN", hide_env_values = true)]
    pub sonar_token: Option<String>,

    #[arg(long, env = "SONAR_PROJECT_KEY")]
    pub project_key: Option<String>,

    /// Quality gate wait, in seconds
    #[arg(long, env = "QUALITY_GATE_TIMEOUT", default_value_t = 300)]
    pub quality_gate_timeout: u64,

    /// Quality gate poll interval, in seconds
    #[arg(long, env = "QUALITY_GATE_POLL", default_value_t = 5)]
    pub quality_gate_poll: u64,

    /// Fail the run on HIGH/CRITICAL vulnerabilities (accepts 1/0, yes/no, true/false)
    #[arg(
        long,
        env = "SCAN_BLOCKING",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value = "false",
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    pub scan_blocking: bool,
}

impl PipelineArgs {
    /// Converts the arguments into a runner configuration
    ///
    /// Validation is left to the caller; a pipeline run reports an invalid
    /// configuration as an aborted run.
    pub fn into_config(self) -> Config {
        Config {
            region: self.region,
            account_id: self.account_id,
            repository: self.repository,
            cluster_name: self.cluster_name,
            namespace: self.namespace,
            deployment: self.deployment,
            container: self.container,
            service: self.service,
            build_number: self.build_number,
            commit: self.commit,
            branch: self.branch,
            workspace: self.workspace,
            manifests_dir: self.manifests_dir,
            sonar_host_url: self.sonar_host_url,
            sonar_token: self.sonar_token,
            project_key: self.project_key,
            quality_gate_timeout: Duration::from_secs(self.quality_gate_timeout),
            quality_gate_poll: Duration::from_secs(self.quality_gate_poll),
            scan_blocking: self.scan_blocking,
            ..Config::default()
        }
    }
}

/// Execute the pipeline and report the outcome
pub async fn handle_run(args: PipelineArgs, json: bool) -> Result<ExitCode> {
    let config = args.into_config();
    let executor = Arc::new(ProcessExecutor::new());
    let gate = Arc::new(SonarClient::new(
        config.sonar_host_url.clone(),
        config.sonar_token.clone(),
    ));

    let mut runner = PipelineRunner::new(config, executor, gate);
    if json {
        runner = runner.quiet();
    }

    let report = runner.execute().await;
    info!("Run {} finished: {:?}", report.run_id, report.outcome);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}
