//! Run report types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::log::LogEntry;
use crate::domain::stage::{StageFailure, StageName, StageRecord, StageStatus};

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed {
        stage: StageName,
        reason: StageFailure,
    },
    /// The run could not start: invalid configuration or unresolved context
    Aborted { reason: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Everything a run produced, reported once at the end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub image: String,
    pub stages: Vec<StageRecord>,
    pub outcome: RunOutcome,
    /// Application URL resolved after a successful deploy
    pub access_url: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl RunReport {
    /// Stages that actually ran, in order
    pub fn executed(&self) -> impl Iterator<Item = StageName> + '_ {
        self.stages
            .iter()
            .filter(|record| record.status != StageStatus::Skipped)
            .map(|record| record.name)
    }

    pub fn record(&self, name: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|record| record.name == name)
    }

    /// Process exit code for the run
    pub fn exit_code(&self) -> i32 {
        if self.outcome.is_success() { 0 } else { 1 }
    }
}
