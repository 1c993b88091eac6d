//! The ingestion pipeline: extract, chunk, embed, and persist one document as a single job.
//!
//! Stages run strictly in sequence. The vector store and the document repository share no
//! transaction, so the pipeline is a saga: the only compensating action is marking an existing
//! document record `failed` when a later stage aborts.

pub mod orchestrator;
pub mod state;
pub mod types;

pub use orchestrator::{IngestionPipeline, JobRunner, PipelineComponents};
pub use state::{IngestionStep, JobPhase, JobProgress, LoggingReporter, ProgressReporter};
pub use types::{IngestionError, IngestionJob, IngestionOutcome};
