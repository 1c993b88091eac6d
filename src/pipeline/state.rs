//! Step vocabulary and the progress record written at each transition.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Closed set of steps a job reports, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStep {
    /// Raw bytes are being read and converted to page text.
    ExtractingText,
    /// Pages are being split into chunks.
    Chunking,
    /// Chunks are being sent to the embedding provider.
    GeneratingEmbeddings,
    /// Vectors are being written to the vector store.
    StoringVectors,
    /// Vectors stored; the document record is being marked completed.
    Finalizing,
    /// Terminal success.
    Completed,
    /// Terminal failure, entered from any step.
    Error,
}

impl IngestionStep {
    /// Label reported to callers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExtractingText => "extracting_text",
            Self::Chunking => "chunking",
            Self::GeneratingEmbeddings => "generating_embeddings",
            Self::StoringVectors => "storing_vectors",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Fixed progress percentage for the step.
    pub const fn progress(self) -> u8 {
        match self {
            Self::ExtractingText => 10,
            Self::Chunking => 30,
            Self::GeneratingEmbeddings => 60,
            Self::StoringVectors => 85,
            Self::Finalizing => 95,
            Self::Completed => 100,
            Self::Error => 0,
        }
    }
}

impl fmt::Display for IngestionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse job phase carried alongside the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    /// A non-terminal step is active.
    Processing,
    /// The job finished successfully.
    Completed,
    /// The job aborted.
    Failed,
}

/// Four-field progress record, replaced as a whole at every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// Coarse phase.
    pub status: JobPhase,
    /// Active step.
    pub step: IngestionStep,
    /// Percentage tied to the step.
    pub progress: u8,
    /// Captured error message; present only in the failed phase.
    pub error: Option<String>,
}

impl JobProgress {
    /// Record for entering `step` on the success path.
    pub fn at(step: IngestionStep) -> Self {
        let status = if step == IngestionStep::Completed {
            JobPhase::Completed
        } else {
            JobPhase::Processing
        };
        Self {
            status,
            step,
            progress: step.progress(),
            error: None,
        }
    }

    /// Terminal failure record carrying the captured message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobPhase::Failed,
            step: IngestionStep::Error,
            progress: IngestionStep::Error.progress(),
            error: Some(message.into()),
        }
    }
}

/// Sink for job progress records.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Replace the job's current progress record.
    async fn report(&self, progress: JobProgress);
}

/// Reporter that only logs transitions; used for inline runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReporter;

#[async_trait]
impl ProgressReporter for LoggingReporter {
    async fn report(&self, progress: JobProgress) {
        match &progress.error {
            Some(error) => tracing::warn!(step = %progress.step, %error, "Ingestion failed"),
            None => tracing::info!(
                step = %progress.step,
                progress = progress.progress,
                "Ingestion step"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_steps_strictly_increase_progress() {
        let steps = [
            IngestionStep::ExtractingText,
            IngestionStep::Chunking,
            IngestionStep::GeneratingEmbeddings,
            IngestionStep::StoringVectors,
            IngestionStep::Finalizing,
            IngestionStep::Completed,
        ];
        for pair in steps.windows(2) {
            assert!(pair[0].progress() < pair[1].progress());
        }
        assert_eq!(IngestionStep::Completed.progress(), 100);
    }

    #[test]
    fn records_carry_phase_and_error() {
        let running = JobProgress::at(IngestionStep::Chunking);
        assert_eq!(running.status, JobPhase::Processing);
        assert_eq!(running.progress, 30);
        assert_eq!(running.error, None);

        assert_eq!(
            JobProgress::at(IngestionStep::Completed).status,
            JobPhase::Completed
        );

        let failed = JobProgress::failed("boom");
        assert_eq!(failed.step, IngestionStep::Error);
        assert_eq!(failed.progress, 0);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }

    #[test]
    fn step_labels_match_serialization() {
        let json = serde_json::to_value(IngestionStep::GeneratingEmbeddings).expect("json");
        assert_eq!(json, IngestionStep::GeneratingEmbeddings.as_str());
    }
}
