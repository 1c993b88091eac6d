//! Pipeline driver: runs one job through every step and compensates on failure.

use super::state::{IngestionStep, JobProgress, ProgressReporter};
use super::types::{IngestionError, IngestionJob, IngestionOutcome};
use crate::config::Config;
use crate::documents::{
    DocumentRepository, DocumentStatus, NewDocument, SqliteDocumentRepository,
};
use crate::embedding::EmbeddingGenerator;
use crate::extraction::ExtractorRegistry;
use crate::metrics::IngestionMetrics;
use crate::processing::{Chunk, chunk_pages};
use crate::qdrant::{ChunkPayload, QdrantService, SearchHit, VectorPoint, VectorStore};
use crate::storage::{LocalObjectStore, ObjectStore};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Executes ingestion jobs on behalf of a task queue.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run one job to completion or failure, reporting progress along the way.
    async fn run_job(
        &self,
        job: IngestionJob,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<IngestionOutcome, IngestionError>;
}

/// Collaborators wired into an [`IngestionPipeline`].
pub struct PipelineComponents {
    /// Content-type dispatch table.
    pub extractors: ExtractorRegistry,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by adjacent chunks.
    pub chunk_overlap: usize,
    /// Batch embedding contract.
    pub embedder: EmbeddingGenerator,
    /// Vector database gateway.
    pub vectors: Arc<dyn VectorStore>,
    /// Document record repository.
    pub documents: Arc<dyn DocumentRepository>,
    /// Raw byte storage.
    pub objects: Arc<dyn ObjectStore>,
    /// Target collection for every point.
    pub collection: String,
    /// Access qualifier written into each payload.
    pub access_level: String,
    /// Outcome counters.
    pub metrics: Arc<IngestionMetrics>,
}

/// Sequences extraction, chunking, embedding, and persistence for one document per run.
pub struct IngestionPipeline {
    extractors: ExtractorRegistry,
    chunk_size: usize,
    chunk_overlap: usize,
    embedder: EmbeddingGenerator,
    vectors: Arc<dyn VectorStore>,
    documents: Arc<dyn DocumentRepository>,
    objects: Arc<dyn ObjectStore>,
    collection: String,
    access_level: String,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(components: PipelineComponents) -> Self {
        Self {
            extractors: components.extractors,
            chunk_size: components.chunk_size,
            chunk_overlap: components.chunk_overlap,
            embedder: components.embedder,
            vectors: components.vectors,
            documents: components.documents,
            objects: components.objects,
            collection: components.collection,
            access_level: components.access_level,
            metrics: components.metrics,
        }
    }

    /// Build the production pipeline: Qdrant, SQLite, local storage, configured embeddings.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let vectors = QdrantService::new(config).context("failed to initialize Qdrant client")?;
        let documents = SqliteDocumentRepository::open(&config.database_path).with_context(|| {
            format!(
                "failed to open document database at {}",
                config.database_path.display()
            )
        })?;
        let embedder = EmbeddingGenerator::from_config(config)
            .context("failed to initialize embedding client")?;

        Ok(Self::new(PipelineComponents {
            extractors: ExtractorRegistry::default(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            embedder,
            vectors: Arc::new(vectors),
            documents: Arc::new(documents),
            objects: Arc::new(LocalObjectStore::new(config)),
            collection: config.qdrant_collection_name.clone(),
            access_level: config.access_level.clone(),
            metrics: Arc::new(IngestionMetrics::new()),
        }))
    }

    /// Shared document repository.
    pub fn documents(&self) -> Arc<dyn DocumentRepository> {
        Arc::clone(&self.documents)
    }

    /// Shared object store.
    pub fn objects(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.objects)
    }

    /// Shared outcome counters.
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Extraction table, used upstream to reject unsupported uploads early.
    pub fn extractors(&self) -> &ExtractorRegistry {
        &self.extractors
    }

    /// Nearest chunks to `query` among those owned by `owner_id`. Blank queries match nothing.
    pub async fn search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, IngestionError> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                IngestionError::EmbeddingProvider("provider returned no vectors".to_string())
            })?;
        let mut hits = self
            .vectors
            .search(&self.collection, owner_id, vector, limit)
            .await?;
        hits.retain(|hit| hit.payload.owner_id == owner_id);
        tracing::debug!(owner_id, hits = hits.len(), "Search served");
        Ok(hits)
    }

    /// Run one job. On failure the document record, if one exists, is marked failed and the
    /// original error is returned.
    pub async fn run(
        &self,
        job: &IngestionJob,
        reporter: &dyn ProgressReporter,
    ) -> Result<IngestionOutcome, IngestionError> {
        let mut document_id = None;
        match self.execute(job, reporter, &mut document_id).await {
            Ok(outcome) => {
                self.metrics.record_completed(outcome.chunk_count as u64);
                tracing::info!(
                    document_id = %outcome.document_id,
                    owner_id = %job.owner_id,
                    chunks = outcome.chunk_count,
                    "Ingestion completed"
                );
                Ok(outcome)
            }
            Err(error) => {
                let message = error.to_string();
                if let Some(id) = document_id {
                    self.mark_failed(id, &message).await;
                }
                reporter.report(JobProgress::failed(message.clone())).await;
                self.metrics.record_failed();
                tracing::error!(
                    document_id = ?document_id,
                    filename = %job.filename,
                    error = %message,
                    "Ingestion failed"
                );
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        job: &IngestionJob,
        reporter: &dyn ProgressReporter,
        document_id: &mut Option<Uuid>,
    ) -> Result<IngestionOutcome, IngestionError> {
        reporter
            .report(JobProgress::at(IngestionStep::ExtractingText))
            .await;
        let bytes = self.objects.read(&job.storage_location).await?;
        let pages = self.extractors.extract(&bytes, &job.content_type)?;
        if pages.is_empty() {
            return Err(IngestionError::NoExtractableContent);
        }

        reporter.report(JobProgress::at(IngestionStep::Chunking)).await;
        let chunks = chunk_pages(&pages, self.chunk_size, self.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(IngestionError::NoExtractableContent);
        }
        tracing::debug!(pages = pages.len(), chunks = chunks.len(), "Chunked document");

        let record = self
            .documents
            .create(NewDocument {
                owner_id: job.owner_id.clone(),
                filename: job.filename.clone(),
                content_type: job.content_type.clone(),
                storage_location: job.storage_location.clone(),
            })
            .await?;
        *document_id = Some(record.id);

        reporter
            .report(JobProgress::at(IngestionStep::GeneratingEmbeddings))
            .await;
        let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(texts).await?;
        let vector_size = vectors.first().map(|vector| vector.len() as u64).ok_or_else(|| {
            IngestionError::EmbeddingProvider("provider returned no vectors".to_string())
        })?;

        reporter
            .report(JobProgress::at(IngestionStep::StoringVectors))
            .await;
        self.vectors
            .ensure_collection(&self.collection, vector_size)
            .await?;
        let points = self.build_points(&record.owner_id, record.id, &record.filename, chunks, vectors);
        let stored = self.vectors.upsert(&self.collection, points).await?;

        self.documents
            .update_status(record.id, DocumentStatus::Completed, None)
            .await?;
        reporter
            .report(JobProgress::at(IngestionStep::Finalizing))
            .await;
        reporter
            .report(JobProgress::at(IngestionStep::Completed))
            .await;

        Ok(IngestionOutcome {
            document_id: record.id,
            chunk_count: stored,
        })
    }

    /// Pair chunks with vectors strictly by position.
    fn build_points(
        &self,
        owner_id: &str,
        document_id: Uuid,
        filename: &str,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Vec<VectorPoint> {
        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorPoint {
                id: None,
                vector,
                payload: ChunkPayload {
                    owner_id: owner_id.to_string(),
                    document_id: document_id.to_string(),
                    filename: filename.to_string(),
                    page_number: chunk.page_number,
                    chunk_index: chunk.chunk_index,
                    access_level: self.access_level.clone(),
                    text: chunk.text,
                },
            })
            .collect()
    }

    async fn mark_failed(&self, id: Uuid, message: &str) {
        if let Err(secondary) = self
            .documents
            .update_status(id, DocumentStatus::Failed, Some(message.to_string()))
            .await
        {
            tracing::error!(
                document_id = %id,
                error = %secondary,
                "Failed to mark document as failed"
            );
        }
    }
}

#[async_trait]
impl JobRunner for IngestionPipeline {
    async fn run_job(
        &self,
        job: IngestionJob,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<IngestionOutcome, IngestionError> {
        self.run(&job, reporter.as_ref()).await
    }
}
