//! Quality gate endpoints

use serde::Deserialize;
use std::fmt;

use crate::SonarClient;
use crate::error::Result;

/// Verdict of the quality gate for one analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityGateStatus {
    Ok,
    Warn,
    Error,
    None,
}

impl QualityGateStatus {
    /// Only an explicit `OK` lets the pipeline continue
    pub fn is_passed(&self) -> bool {
        matches!(self, QualityGateStatus::Ok)
    }
}

impl fmt::Display for QualityGateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityGateStatus::Ok => "OK",
            QualityGateStatus::Warn => "WARN",
            QualityGateStatus::Error => "ERROR",
            QualityGateStatus::None => "NONE",
        };
        f.write_str(s)
    }
}

/// A single gate condition and how the analysis measured against it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCondition {
    pub status: QualityGateStatus,
    pub metric_key: String,
    #[serde(default)]
    pub comparator: Option<String>,
    #[serde(default)]
    pub error_threshold: Option<String>,
    #[serde(default)]
    pub actual_value: Option<String>,
}

/// Quality gate result of an analysis
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectStatus {
    pub status: QualityGateStatus,
    #[serde(default)]
    pub conditions: Vec<GateCondition>,
}

impl ProjectStatus {
    /// Conditions that caused a non-OK verdict
    pub fn failing_conditions(&self) -> impl Iterator<Item = &GateCondition> {
        self.conditions
            .iter()
            .filter(|condition| !condition.status.is_passed())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectStatusEnvelope {
    project_status: ProjectStatus,
}

impl SonarClient {
    /// Get the quality gate verdict for an analysis
    ///
    /// # Arguments
    /// * `analysis_id` - The analysis produced by a successful background task
    pub async fn project_status(&self, analysis_id: &str) -> Result<ProjectStatus> {
        let envelope: ProjectStatusEnvelope = self
            .get(
                "/api/qualitygates/project_status",
                &[("analysisId", analysis_id)],
            )
            .await?;
        Ok(envelope.project_status)
    }
}
