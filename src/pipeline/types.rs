//! Job input, outcome, and the pipeline error taxonomy.

use crate::documents::RepositoryError;
use crate::embedding::EmbeddingClientError;
use crate::extraction::ExtractionError;
use crate::processing::ChunkingError;
use crate::qdrant::QdrantError;
use crate::storage::ObjectStoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Message used when a document parses but yields no text.
pub const NO_CONTENT_MESSAGE: &str = "No extractable content found in document";

/// Everything a worker needs to ingest one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionJob {
    /// Location returned by the object store.
    pub storage_location: String,
    /// Owner of the upload.
    pub owner_id: String,
    /// Original filename.
    pub filename: String,
    /// Canonical MIME type detected at upload.
    pub content_type: String,
}

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOutcome {
    /// Document record marked completed.
    pub document_id: Uuid,
    /// Vector points written.
    pub chunk_count: usize,
}

/// Why an ingestion job failed. `Display` is the message callers see.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The stored raw bytes could not be read back.
    #[error("Source document unavailable: {0}")]
    SourceUnavailable(String),
    /// No extraction strategy is registered for the content type.
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// The source is corrupt or not what its content type claims.
    #[error("Text extraction failed: {0}")]
    Extraction(String),
    /// The source parsed but every page was blank.
    #[error("{}", NO_CONTENT_MESSAGE)]
    NoExtractableContent,
    /// Chunk window parameters cannot make progress.
    #[error("Invalid chunking parameters: max_size={max_size}, overlap={overlap}")]
    InvalidChunkingParameters {
        /// Requested maximum chunk length.
        max_size: usize,
        /// Requested overlap.
        overlap: usize,
    },
    /// Transport or provider-side embedding failure.
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),
    /// The collection exists with a different vector size.
    #[error(
        "Collection '{collection}' expects vectors of size {actual}, but the embedding model produced {expected}"
    )]
    CollectionGeometryMismatch {
        /// Collection name.
        collection: String,
        /// Vector size produced by the current job.
        expected: u64,
        /// Vector size the collection holds.
        actual: u64,
    },
    /// A metadata or vector store write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<ObjectStoreError> for IngestionError {
    fn from(error: ObjectStoreError) -> Self {
        Self::SourceUnavailable(error.to_string())
    }
}

impl From<ExtractionError> for IngestionError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::UnsupportedContentType(content_type) => {
                Self::UnsupportedContentType(content_type)
            }
            other @ ExtractionError::Malformed { .. } => Self::Extraction(other.to_string()),
        }
    }
}

impl From<ChunkingError> for IngestionError {
    fn from(error: ChunkingError) -> Self {
        match error {
            ChunkingError::InvalidParameters { max_size, overlap } => {
                Self::InvalidChunkingParameters { max_size, overlap }
            }
        }
    }
}

impl From<EmbeddingClientError> for IngestionError {
    fn from(error: EmbeddingClientError) -> Self {
        Self::EmbeddingProvider(error.to_string())
    }
}

impl From<QdrantError> for IngestionError {
    fn from(error: QdrantError) -> Self {
        match error {
            QdrantError::GeometryMismatch {
                collection,
                expected,
                actual,
            } => Self::CollectionGeometryMismatch {
                collection,
                expected,
                actual,
            },
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<RepositoryError> for IngestionError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}
