//! Stage domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Named stages of the deployment pipeline
///
/// The order of [`StageName::ALL`] is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageName {
    Checkout,
    StaticAnalysis,
    QualityGate,
    BuildImage,
    VulnerabilityScan,
    PushImage,
    UpdateKubeconfig,
    Deploy,
    VerifyDeployment,
}

impl StageName {
    pub const ALL: [StageName; 9] = [
        StageName::Checkout,
        StageName::StaticAnalysis,
        StageName::QualityGate,
        StageName::BuildImage,
        StageName::VulnerabilityScan,
        StageName::PushImage,
        StageName::UpdateKubeconfig,
        StageName::Deploy,
        StageName::VerifyDeployment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Checkout => "Checkout",
            StageName::StaticAnalysis => "Static-Analysis",
            StageName::QualityGate => "Quality-Gate",
            StageName::BuildImage => "Build-Image",
            StageName::VulnerabilityScan => "Vulnerability-Scan",
            StageName::PushImage => "Push-Image",
            StageName::UpdateKubeconfig => "Update-Kubeconfig",
            StageName::Deploy => "Deploy",
            StageName::VerifyDeployment => "Verify-Deployment",
        }
    }

    /// Whether a failure of this stage aborts the run
    pub fn is_blocking(&self) -> bool {
        !matches!(self, StageName::VulnerabilityScan)
    }

    /// 1-based position in the pipeline
    pub fn position(&self) -> usize {
        Self::ALL
            .iter()
            .position(|stage| stage == self)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageName::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown stage '{}'", s))
    }
}

/// Why a stage did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StageFailure {
    /// An external command exited non-zero
    #[error("`{program}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    /// An external command could not be started
    #[error("failed to start `{program}`: {message}")]
    Spawn { program: String, message: String },

    /// The code-quality server returned a failing verdict
    #[error(
        "quality gate rejected the analysis (status {status}){}",
        failing_suffix(.conditions)
    )]
    QualityGateRejected {
        status: String,
        /// Failing conditions, e.g. `new_coverage=41.2 (LT 80)`
        #[serde(default)]
        conditions: Vec<String>,
    },

    /// No verdict arrived within the bounded wait
    #[error("quality gate did not report within {waited_secs}s")]
    QualityGateTimeout { waited_secs: u64 },

    /// The analysis task failed or the server could not be queried
    #[error("quality gate error: {0}")]
    QualityGate(String),

    #[error("I/O error: {0}")]
    Io(String),
}

fn failing_suffix(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(": {}", conditions.join(", "))
    }
}

impl StageFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StageFailure::QualityGateTimeout { .. })
    }
}

/// Final status of a stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Succeeded,
    /// A non-blocking stage failed; the run continued
    Warned,
    Failed,
    /// Never executed because an earlier stage failed
    Skipped,
}

/// What happened to one stage during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: StageName,
    pub status: StageStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub message: Option<String>,
}

impl StageRecord {
    pub fn skipped(name: StageName) -> Self {
        Self {
            name,
            status: StageStatus::Skipped,
            started_at: None,
            finished_at: None,
            message: None,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
