//! Compute engine task endpoints
//!
//! The server processes each uploaded scanner report as a background task.
//! The quality gate can only be read once that task has succeeded.

use serde::Deserialize;
use std::fmt;

use crate::SonarClient;
use crate::error::Result;

/// Processing state of a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CeTaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
    Canceled,
}

impl CeTaskStatus {
    /// Whether the task has stopped changing
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CeTaskStatus::Success | CeTaskStatus::Failed | CeTaskStatus::Canceled
        )
    }
}

impl fmt::Display for CeTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CeTaskStatus::Pending => "PENDING",
            CeTaskStatus::InProgress => "IN_PROGRESS",
            CeTaskStatus::Success => "SUCCESS",
            CeTaskStatus::Failed => "FAILED",
            CeTaskStatus::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// A background analysis task
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CeTask {
    pub id: String,
    pub status: CeTaskStatus,
    /// Set once the task succeeded
    #[serde(default)]
    pub analysis_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CeTaskEnvelope {
    task: CeTask,
}

impl SonarClient {
    /// Get a background task by ID
    ///
    /// # Arguments
    /// * `task_id` - The `ceTaskId` from the scanner report
    pub async fn ce_task(&self, task_id: &str) -> Result<CeTask> {
        let envelope: CeTaskEnvelope = self.get("/api/ce/task", &[("id", task_id)]).await?;
        Ok(envelope.task)
    }
}
