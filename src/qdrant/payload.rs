//! Payload stored with each chunk vector.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::qdrant::types::VectorPoint;

/// Provenance and access metadata attached to every point.
///
/// `owner_id` is the only isolation boundary between users at query time, so it is always
/// copied from the document record that produced the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Owner of the source document.
    pub owner_id: String,
    /// Document record identifier.
    pub document_id: String,
    /// Original filename.
    pub filename: String,
    /// 1-based source page.
    pub page_number: u32,
    /// Zero-based position within the page.
    pub chunk_index: usize,
    /// Access qualifier used by retrieval filters.
    pub access_level: String,
    /// Chunk text, kept for snippet display.
    pub text: String,
}

/// Serialize a point for the Qdrant upsert body, assigning an id when missing.
pub(crate) fn point_to_json(point: VectorPoint) -> Value {
    let id = point.id.unwrap_or_else(Uuid::new_v4);
    json!({
        "id": id.to_string(),
        "vector": point.vector,
        "payload": point.payload,
    })
}
