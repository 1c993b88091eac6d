//! Durable document records: the authoritative ingestion outcome per uploaded file.

pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

pub use sqlite::SqliteDocumentRepository;

/// Message stored when a document is marked failed without a captured reason.
pub const GENERIC_FAILURE_MESSAGE: &str = "Ingestion failed";

/// Errors raised by the metadata repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// SQLite rejected the statement.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The database directory could not be prepared.
    #[error("Database path '{path}' is unusable: {source}")]
    Io {
        /// Directory that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The blocking task running the query panicked or was cancelled.
    #[error("Database task failed: {0}")]
    Task(String),
    /// A stored row could not be decoded.
    #[error("Corrupt document row: {0}")]
    Corrupt(String),
}

/// Lifecycle status of a document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Created after chunking; vectors not yet confirmed.
    Processing,
    /// Every chunk has a stored vector point.
    Completed,
    /// Ingestion aborted; `error_message` holds the reason.
    Failed,
}

impl DocumentStatus {
    /// Stable lowercase label used in storage and JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = RepositoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(RepositoryError::Corrupt(format!("unknown status '{other}'"))),
        }
    }
}

/// One ingested file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    /// Opaque record identifier.
    pub id: Uuid,
    /// Owner the document (and every vector derived from it) belongs to.
    pub owner_id: String,
    /// Original filename.
    pub filename: String,
    /// Canonical MIME type detected at upload.
    pub content_type: String,
    /// Where the raw bytes live.
    pub storage_location: String,
    /// Lifecycle status.
    pub status: DocumentStatus,
    /// Present exactly when `status` is failed.
    pub error_message: Option<String>,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Last status change.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields supplied when a record is created.
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Owner identifier.
    pub owner_id: String,
    /// Original filename.
    pub filename: String,
    /// Canonical MIME type.
    pub content_type: String,
    /// Storage location of the raw bytes.
    pub storage_location: String,
}

/// Storage for document records.
///
/// Every call is its own transaction; nothing here coordinates with the vector store.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new record with status `processing`.
    async fn create(&self, document: NewDocument) -> Result<DocumentRecord, RepositoryError>;

    /// Change a record's status. Unknown ids are ignored.
    ///
    /// A non-failed status clears any error; `failed` always carries a message.
    async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError>;

    /// Fetch one record.
    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepositoryError>;

    /// Records owned by `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, RepositoryError>;

    /// Records currently in `status`, oldest first.
    async fn list_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRecord>, RepositoryError>;
}

/// Apply the failed-iff-error rule to a requested status change.
pub(crate) fn normalize_error(status: DocumentStatus, error: Option<String>) -> Option<String> {
    match status {
        DocumentStatus::Failed => Some(
            error
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
        ),
        _ => None,
    }
}
