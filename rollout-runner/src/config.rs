//! Runner configuration
//!
//! Defines every input of a pipeline run: cloud location, resource names,
//! build identity, code-quality server settings and the bounded wait of the
//! quality gate.

use rollout_core::domain::stage::StageName;
use std::path::PathBuf;
use std::time::Duration;

/// Runner configuration
///
/// Values that are `None` are resolved when the pipeline context is built
/// (account id from the identity service, commit from the workspace).
#[derive(Debug, Clone)]
pub struct Config {
    pub region: String,

    /// Account id; resolved from the caller identity when absent
    pub account_id: Option<String>,

    /// Registry repository and local image name
    pub repository: String,

    pub cluster_name: String,
    pub namespace: String,
    pub deployment: String,
    pub container: String,
    pub service: String,

    /// Build counter, used as the image tag
    pub build_number: String,

    /// Commit to deploy; read from the workspace HEAD when absent
    pub commit: Option<String>,
    pub branch: String,

    /// Source checkout the stages operate on
    pub workspace: PathBuf,

    /// Manifests applied before the image update
    pub manifests_dir: Option<PathBuf>,

    /// Code-quality server base URL (e.g., "http://localhost:9000")
    pub sonar_host_url: String,

    /// Code-quality user token
    pub sonar_token: Option<String>,

    /// Code-quality project key; defaults to the repository name
    pub project_key: Option<String>,

    /// Upper bound on waiting for the quality-gate verdict
    pub quality_gate_timeout: Duration,

    /// How often the analysis task is polled while waiting
    pub quality_gate_poll: Duration,

    /// Fail the run on HIGH/CRITICAL scan findings
    pub scan_blocking: bool,

    /// Severities reported by the vulnerability scan
    pub scan_severity: String,
}

impl Config {
    /// Project key used for analysis and gate lookups
    pub fn project_key(&self) -> &str {
        self.project_key.as_deref().unwrap_or(&self.repository)
    }

    /// Whether a failure of `stage` aborts the run under this configuration
    pub fn is_blocking(&self, stage: StageName) -> bool {
        match stage {
            StageName::VulnerabilityScan => self.scan_blocking,
            other => other.is_blocking(),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let required = [
            ("region", &self.region),
            ("repository", &self.repository),
            ("cluster_name", &self.cluster_name),
            ("namespace", &self.namespace),
            ("deployment", &self.deployment),
            ("container", &self.container),
            ("service", &self.service),
            ("branch", &self.branch),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if !is_valid_tag(&self.build_number) {
            anyhow::bail!(
                "build_number '{}' is not a valid image tag",
                self.build_number
            );
        }

        if let Some(account_id) = &self.account_id {
            if !is_account_id(account_id) {
                anyhow::bail!("account_id must be 12 digits, got '{}'", account_id);
            }
        }

        if !self.sonar_host_url.starts_with("http://") && !self.sonar_host_url.starts_with("https://")
        {
            anyhow::bail!("sonar_host_url must start with http:// or https://");
        }

        if self.quality_gate_timeout.is_zero() {
            anyhow::bail!("quality_gate_timeout must be greater than 0");
        }

        if self.quality_gate_poll.is_zero() {
            anyhow::bail!("quality_gate_poll must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: None,
            repository: "my-website".to_string(),
            cluster_name: "my-eks-cluster".to_string(),
            namespace: "default".to_string(),
            deployment: "my-website".to_string(),
            container: "my-website".to_string(),
            service: "my-website-service".to_string(),
            build_number: "local".to_string(),
            commit: None,
            branch: "main".to_string(),
            workspace: PathBuf::from("."),
            manifests_dir: None,
            sonar_host_url: "http://localhost:9000".to_string(),
            sonar_token: None,
            project_key: None,
            quality_gate_timeout: Duration::from_secs(300), // 5 minutes
            quality_gate_poll: Duration::from_secs(5),
            scan_blocking: false,
            scan_severity: "HIGH,CRITICAL".to_string(),
        }
    }
}

/// Account ids are exactly twelve ASCII digits
pub fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Image tags: up to 128 of `[A-Za-z0-9_.-]`, not starting with `.` or `-`
fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 128
        && !tag.starts_with('.')
        && !tag.starts_with('-')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
