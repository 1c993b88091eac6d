//! Shared types used by the Qdrant client and its callers.

use crate::qdrant::payload::ChunkPayload;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Collection exists with a vector size other than the requested one.
    #[error(
        "Collection '{collection}' stores vectors of size {actual}, but {expected} was requested"
    )]
    GeometryMismatch {
        /// Collection name.
        collection: String,
        /// Vector size requested by the caller.
        expected: u64,
        /// Vector size the collection was created with.
        actual: u64,
    },
    /// Qdrant answered successfully but the body lacked expected fields.
    #[error("Malformed Qdrant response: {0}")]
    MalformedResponse(String),
}

/// One vector plus its payload, ready for upsert.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    /// Point identifier; a fresh UUID is assigned when absent.
    pub id: Option<Uuid>,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Payload stored alongside the vector.
    pub payload: ChunkPayload,
}

/// One scored point returned by an owner-scoped search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Similarity score; higher is closer.
    pub score: f32,
    /// Payload of the matching chunk.
    pub payload: ChunkPayload,
}

/// Capability the ingestion pipeline needs from a vector database.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create `name` with the given geometry and cosine distance when absent; verify it otherwise.
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), QdrantError>;

    /// Write every point in one call, returning how many were stored.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>)
    -> Result<usize, QdrantError>;

    /// Nearest chunks to `vector` among points whose payload `owner_id` matches. A missing
    /// collection yields no hits.
    async fn search(
        &self,
        collection: &str,
        owner_id: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, QdrantError>;
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) result: Vec<SearchHit>,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorsConfig,
}

/// Unnamed collections report `{size, distance}`; named-vector collections report a map.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum VectorsConfig {
    Single { size: u64 },
    Named(std::collections::HashMap<String, VectorParams>),
}

#[derive(Deserialize)]
pub(crate) struct VectorParams {
    pub(crate) size: u64,
}

impl VectorsConfig {
    /// Size of the default vector, or of the only named vector.
    pub(crate) fn size(&self) -> Option<u64> {
        match self {
            Self::Single { size } => Some(*size),
            Self::Named(named) if named.len() == 1 => named.values().next().map(|p| p.size),
            Self::Named(_) => None,
        }
    }
}
