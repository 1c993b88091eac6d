//! Upload intake shared by the HTTP surface and the CLI: sniff, store, enqueue.

use crate::documents::{DocumentRecord, DocumentRepository, RepositoryError};
use crate::extraction::ExtractorRegistry;
use crate::jobs::{JobQueue, JobStatusView, QueueError};
use crate::metrics::{IngestionMetrics, MetricsSnapshot};
use crate::pipeline::{IngestionError, IngestionJob, IngestionPipeline};
use crate::qdrant::SearchHit;
use crate::sniff::{SniffError, detect_content_type};
use crate::storage::{ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Hits returned when a search does not name a limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
/// Largest number of hits a single search may return.
pub const MAX_SEARCH_LIMIT: usize = 50;

/// Reasons an upload is refused before a job exists.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Content sniffing rejected the bytes.
    #[error(transparent)]
    Sniff(#[from] SniffError),
    /// The detected type has no extraction strategy.
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    /// Raw bytes could not be stored.
    #[error("Failed to store upload: {0}")]
    Storage(#[from] ObjectStoreError),
    /// The job could not be enqueued.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Operations the HTTP router needs.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    /// Sniff, store, and enqueue one upload, returning the job id.
    async fn submit_upload(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Uuid, UploadError>;

    /// Current status of a job, `None` when the id is unknown.
    async fn job_status(&self, task_id: Uuid) -> Option<JobStatusView>;

    /// Document records owned by `owner_id`, newest first.
    async fn list_documents(&self, owner_id: &str)
    -> Result<Vec<DocumentRecord>, RepositoryError>;

    /// Chunks owned by `owner_id` nearest to `query`, at most `limit` of them.
    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, IngestionError>;

    /// Ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;

    /// Name reported by the health check.
    fn service_name(&self) -> &str;
}

/// Submit an upload, sleeping `backoff` between attempts while the queue is full.
///
/// Every other outcome, success or failure, is returned as soon as it happens.
pub async fn submit_with_backoff<S>(
    service: &S,
    owner_id: &str,
    filename: &str,
    bytes: Vec<u8>,
    backoff: Duration,
) -> Result<Uuid, UploadError>
where
    S: IngestionApi + ?Sized,
{
    let mut attempts = 0u32;
    loop {
        match service.submit_upload(owner_id, filename, bytes.clone()).await {
            Err(UploadError::Queue(QueueError::Full)) => {
                attempts += 1;
                tracing::debug!(filename, attempts, "Queue full; backing off");
                tokio::time::sleep(backoff).await;
            }
            outcome => return outcome,
        }
    }
}

/// Production implementation backed by a [`JobQueue`].
pub struct IngestionService {
    app_name: String,
    queue: JobQueue,
    pipeline: Arc<IngestionPipeline>,
    documents: Arc<dyn DocumentRepository>,
    objects: Arc<dyn ObjectStore>,
    extractors: ExtractorRegistry,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionService {
    /// Start `workers` queue workers over `pipeline` and wire the intake around them.
    pub fn start(
        app_name: impl Into<String>,
        pipeline: Arc<IngestionPipeline>,
        workers: usize,
        capacity: usize,
    ) -> Self {
        let documents = pipeline.documents();
        let objects = pipeline.objects();
        let extractors = pipeline.extractors().clone();
        let metrics = pipeline.metrics();
        let queue = JobQueue::start(pipeline.clone(), workers, capacity);
        Self {
            app_name: app_name.into(),
            queue,
            pipeline,
            documents,
            objects,
            extractors,
            metrics,
        }
    }

    /// Keep finished jobs visible to status polling for `retention`.
    pub fn with_job_retention(self, retention: Duration) -> Self {
        Self {
            queue: self.queue.with_retention(retention),
            ..self
        }
    }

    /// Underlying queue, for callers that poll directly.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

#[async_trait]
impl IngestionApi for IngestionService {
    async fn submit_upload(
        &self,
        owner_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Uuid, UploadError> {
        let content_type = detect_content_type(&bytes, filename)?;
        if !self.extractors.supports(content_type) {
            return Err(UploadError::Unsupported(content_type.to_string()));
        }

        let storage_location = self.objects.save(&bytes, owner_id, filename).await?;
        let submitted = self
            .queue
            .submit(IngestionJob {
                storage_location: storage_location.clone(),
                owner_id: owner_id.to_string(),
                filename: filename.to_string(),
                content_type: content_type.to_string(),
            })
            .await;
        let task_id = match submitted {
            Ok(task_id) => task_id,
            Err(error) => {
                if let Err(cleanup) = self.objects.remove(&storage_location).await {
                    tracing::warn!(
                        error = %cleanup,
                        location = %storage_location,
                        "Failed to remove upload after enqueue failure"
                    );
                }
                return Err(error.into());
            }
        };

        tracing::info!(
            %task_id,
            owner_id,
            filename,
            content_type,
            bytes = bytes.len(),
            "Upload accepted"
        );
        Ok(task_id)
    }

    async fn job_status(&self, task_id: Uuid) -> Option<JobStatusView> {
        self.queue.status(task_id).await
    }

    async fn list_documents(
        &self,
        owner_id: &str,
    ) -> Result<Vec<DocumentRecord>, RepositoryError> {
        self.documents.list_for_owner(owner_id).await
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, IngestionError> {
        self.pipeline
            .search(owner_id, query, limit.min(MAX_SEARCH_LIMIT))
            .await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn service_name(&self) -> &str {
        &self.app_name
    }
}
