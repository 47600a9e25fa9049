//! Quality gate wait
//!
//! After the scanner uploads its report the server processes it as a
//! background task. The gate waits for that task and then reads the verdict
//! of the resulting analysis. The whole wait is bounded: when no verdict
//! arrives in time the stage fails with a timeout, which is reported
//! separately from a rejected verdict.

use async_trait::async_trait;
use rollout_core::domain::stage::StageFailure;
use rollout_sonar::{CeTask, CeTaskStatus, ProjectStatus, SonarClient, SonarError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read access to analysis tasks and gate verdicts
#[async_trait]
pub trait QualityGate: Send + Sync {
    /// Current state of a background analysis task
    async fn task(&self, task_id: &str) -> Result<CeTask, SonarError>;

    /// Quality gate verdict of a finished analysis
    async fn verdict(&self, analysis_id: &str) -> Result<ProjectStatus, SonarError>;
}

#[async_trait]
impl QualityGate for SonarClient {
    async fn task(&self, task_id: &str) -> Result<CeTask, SonarError> {
        self.ce_task(task_id).await
    }

    async fn verdict(&self, analysis_id: &str) -> Result<ProjectStatus, SonarError> {
        self.project_status(analysis_id).await
    }
}

/// Waits at most `timeout` for a passing verdict on `task_id`
///
/// # Returns
/// The verdict when it is `OK`
///
/// # Errors
/// - `QualityGateTimeout` when nothing conclusive arrives within `timeout`
/// - `QualityGateRejected` when the verdict is anything but `OK`
/// - `QualityGate` when the task fails or the server cannot be queried
pub async fn wait_for_quality_gate(
    gate: &dyn QualityGate,
    task_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<ProjectStatus, StageFailure> {
    match tokio::time::timeout(timeout, poll_verdict(gate, task_id, poll_interval)).await {
        Ok(result) => result,
        Err(_) => Err(StageFailure::QualityGateTimeout {
            waited_secs: timeout.as_secs(),
        }),
    }
}

async fn poll_verdict(
    gate: &dyn QualityGate,
    task_id: &str,
    poll_interval: Duration,
) -> Result<ProjectStatus, StageFailure> {
    let task = loop {
        let task = gate
            .task(task_id)
            .await
            .map_err(|e| query_failure(&format!("analysis task {}", task_id), e))?;

        debug!("Analysis task {} is {}", task_id, task.status);

        if task.status.is_finished() {
            break task;
        }
        tokio::time::sleep(poll_interval).await;
    };

    if task.status != CeTaskStatus::Success {
        return Err(StageFailure::QualityGate(format!(
            "analysis task {} {}: {}",
            task_id,
            task.status,
            task.error_message.unwrap_or_default()
        )));
    }

    let analysis_id = task.analysis_id.ok_or_else(|| {
        StageFailure::QualityGate(format!(
            "task {} succeeded without an analysis id",
            task_id
        ))
    })?;

    let status = gate
        .verdict(&analysis_id)
        .await
        .map_err(|e| query_failure(&format!("verdict of analysis {}", analysis_id), e))?;

    info!("Quality gate verdict for analysis {}: {}", analysis_id, status.status);

    if status.status.is_passed() {
        return Ok(status);
    }

    let conditions: Vec<String> = status
        .failing_conditions()
        .map(|condition| {
            format!(
                "{}={} ({} {})",
                condition.metric_key,
                condition.actual_value.as_deref().unwrap_or("?"),
                condition.comparator.as_deref().unwrap_or("?"),
                condition.error_threshold.as_deref().unwrap_or("?")
            )
        })
        .collect();
    for condition in &conditions {
        warn!("Failing condition: {}", condition);
    }

    Err(StageFailure::QualityGateRejected {
        status: status.status.to_string(),
        conditions,
    })
}

fn query_failure(what: &str, error: SonarError) -> StageFailure {
    if error.is_unauthorized() {
        StageFailure::QualityGate(format!(
            "not authorized to read {}; check the analysis token",
            what
        ))
    } else if error.is_not_found() {
        StageFailure::QualityGate(format!("{} not found on the server", what))
    } else {
        StageFailure::QualityGate(format!("failed to query {}: {}", what, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGate;
    use rollout_sonar::{GateCondition, QualityGateStatus};

    const FIVE_MINUTES: Duration = Duration::from_secs(300);
    const POLL: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_passing_gate_after_pending_states() {
        let gate = FakeGate::new(
            &[
                CeTaskStatus::Pending,
                CeTaskStatus::InProgress,
                CeTaskStatus::Success,
            ],
            QualityGateStatus::Ok,
        );

        let status = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap();
        assert_eq!(status.status, QualityGateStatus::Ok);
        assert_eq!(gate.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_gate() {
        let gate = FakeGate::new(&[CeTaskStatus::Success], QualityGateStatus::Error);

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StageFailure::QualityGateRejected {
                status: "ERROR".to_string(),
                conditions: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_names_failing_conditions() {
        let gate = FakeGate::new(&[CeTaskStatus::Success], QualityGateStatus::Error)
            .with_conditions(vec![
                GateCondition {
                    status: QualityGateStatus::Error,
                    metric_key: "new_coverage".to_string(),
                    comparator: Some("LT".to_string()),
                    error_threshold: Some("80".to_string()),
                    actual_value: Some("41.2".to_string()),
                },
                GateCondition {
                    status: QualityGateStatus::Ok,
                    metric_key: "new_bugs".to_string(),
                    comparator: Some("GT".to_string()),
                    error_threshold: Some("0".to_string()),
                    actual_value: Some("0".to_string()),
                },
            ]);

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StageFailure::QualityGateRejected {
                status: "ERROR".to_string(),
                conditions: vec!["new_coverage=41.2 (LT 80)".to_string()],
            }
        );
        assert!(err.to_string().contains("new_coverage=41.2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_token_is_reported() {
        let gate = FakeGate::passing().with_task_error(SonarError::api_error(401, "Unauthorized"));

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();

        match err {
            StageFailure::QualityGate(message) => assert!(message.contains("token")),
            other => panic!("expected query failure, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_task_is_reported() {
        let gate = FakeGate::passing().with_task_error(SonarError::NotFound("AYx1".to_string()));

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StageFailure::QualityGate("analysis task AYx1 not found on the server".to_string())
        );
        assert!(!err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_warn_is_rejected() {
        let gate = FakeGate::new(&[CeTaskStatus::Success], QualityGateStatus::Warn);

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, StageFailure::QualityGateRejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_five_minutes() {
        let gate = FakeGate::new(&[CeTaskStatus::Pending], QualityGateStatus::Ok);

        let started = tokio::time::Instant::now();
        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();

        assert_eq!(err, StageFailure::QualityGateTimeout { waited_secs: 300 });
        assert!(err.is_timeout());
        assert!(started.elapsed() >= FIVE_MINUTES);
        assert!(gate.polls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_is_not_a_timeout() {
        let gate = FakeGate::new(&[CeTaskStatus::Failed], QualityGateStatus::Ok);

        let err = wait_for_quality_gate(&gate, "AYx1", FIVE_MINUTES, POLL)
            .await
            .unwrap_err();
        assert!(matches!(err, StageFailure::QualityGate(_)));
        assert!(!err.is_timeout());
    }
}
