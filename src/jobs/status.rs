//! Maps native task state plus pipeline progress onto the caller-facing status vocabulary.

use super::queue::{NativeTaskState, TaskSnapshot};
use crate::documents::GENERIC_FAILURE_MESSAGE;
use crate::pipeline::{IngestionStep, JobPhase};
use serde::Serialize;

/// Closed status vocabulary returned to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Enqueued, not started.
    Pending,
    /// A step is running.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// The queue reported a state this gateway does not recognize.
    Unknown,
}

impl JobStatus {
    /// Whether polling can stop.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status record returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    /// Coarse status.
    pub status: JobStatus,
    /// Current step label, when known.
    pub step: Option<String>,
    /// Progress percentage, 0 to 100.
    pub progress: u8,
    /// Human-readable failure reason.
    pub error: Option<String>,
}

/// Translate a task snapshot. Unrecognized native states are reported as `unknown`, never
/// coerced into a known status.
///
/// A running task whose pipeline already recorded a terminal phase is reported with that phase,
/// since the queue only learns the outcome once the runner returns.
pub fn resolve(snapshot: &TaskSnapshot) -> JobStatusView {
    let progress = snapshot.progress.as_ref();
    let state = match (&snapshot.state, progress.map(|meta| meta.status)) {
        (NativeTaskState::Running, Some(JobPhase::Completed)) => NativeTaskState::Succeeded,
        (NativeTaskState::Running, Some(JobPhase::Failed)) => NativeTaskState::Failed,
        (state, _) => state.clone(),
    };
    match &state {
        NativeTaskState::Pending => JobStatusView {
            status: JobStatus::Pending,
            step: None,
            progress: 0,
            error: None,
        },
        NativeTaskState::Running => JobStatusView {
            status: JobStatus::Processing,
            step: progress.map(|meta| meta.step.as_str().to_string()),
            progress: progress.map_or(0, |meta| meta.progress),
            error: None,
        },
        NativeTaskState::Succeeded => JobStatusView {
            status: JobStatus::Completed,
            step: Some(IngestionStep::Completed.as_str().to_string()),
            progress: IngestionStep::Completed.progress(),
            error: None,
        },
        NativeTaskState::Failed => JobStatusView {
            status: JobStatus::Failed,
            step: Some(IngestionStep::Error.as_str().to_string()),
            progress: IngestionStep::Error.progress(),
            error: Some(
                progress
                    .and_then(|meta| meta.error.clone())
                    .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
            ),
        },
        NativeTaskState::Other(label) => JobStatusView {
            status: JobStatus::Unknown,
            step: progress.map(|meta| meta.step.as_str().to_string()),
            progress: progress.map_or(0, |meta| meta.progress),
            error: Some(format!("Unrecognized task state: {label}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::JobProgress;

    fn snapshot(state: NativeTaskState, progress: Option<JobProgress>) -> TaskSnapshot {
        TaskSnapshot { state, progress }
    }

    #[test]
    fn pending_has_no_step() {
        let view = resolve(&snapshot(NativeTaskState::Pending, None));
        assert_eq!(view.status, JobStatus::Pending);
        assert_eq!(view.step, None);
        assert_eq!(view.progress, 0);
    }

    #[test]
    fn running_uses_pipeline_metadata() {
        let view = resolve(&snapshot(
            NativeTaskState::Running,
            Some(JobProgress::at(IngestionStep::StoringVectors)),
        ));
        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.step.as_deref(), Some("storing_vectors"));
        assert_eq!(view.progress, 85);
        assert_eq!(view.error, None);
    }

    #[test]
    fn failure_surfaces_captured_message_or_generic_text() {
        let captured = resolve(&snapshot(
            NativeTaskState::Failed,
            Some(JobProgress::failed("Embedding provider error: timeout")),
        ));
        assert_eq!(captured.status, JobStatus::Failed);
        assert_eq!(captured.step.as_deref(), Some("error"));
        assert_eq!(
            captured.error.as_deref(),
            Some("Embedding provider error: timeout")
        );

        let generic = resolve(&snapshot(
            NativeTaskState::Failed,
            Some(JobProgress::at(IngestionStep::Chunking)),
        ));
        assert_eq!(generic.error.as_deref(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn running_task_reports_the_recorded_terminal_phase() {
        let failed = resolve(&snapshot(
            NativeTaskState::Running,
            Some(JobProgress::failed("Persistence error: disk full")),
        ));
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.step.as_deref(), Some("error"));
        assert_eq!(failed.error.as_deref(), Some("Persistence error: disk full"));

        let completed = resolve(&snapshot(
            NativeTaskState::Running,
            Some(JobProgress::at(IngestionStep::Completed)),
        ));
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, 100);
        assert_eq!(completed.error, None);
    }

    #[test]
    fn success_is_always_complete() {
        let view = resolve(&snapshot(NativeTaskState::Succeeded, None));
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.step.as_deref(), Some("completed"));
        assert_eq!(view.progress, 100);
    }

    #[test]
    fn unrecognized_states_stay_unknown() {
        let view = resolve(&snapshot(NativeTaskState::Other("RETRY".into()), None));
        assert_eq!(view.status, JobStatus::Unknown);
        assert!(!view.status.is_terminal());
        assert_eq!(view.error.as_deref(), Some("Unrecognized task state: RETRY"));
    }

    #[test]
    fn view_serializes_with_lowercase_status() {
        let view = resolve(&snapshot(NativeTaskState::Pending, None));
        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(
            json,
            serde_json::json!({ "status": "pending", "step": null, "progress": 0, "error": null })
        );
    }
}
