//! SQLite-backed document repository.

use super::{
    DocumentRecord, DocumentRepository, DocumentStatus, NewDocument, RepositoryError,
    normalize_error,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, owner_id, filename, content_type, storage_location, status, \
     error_message, created_at, updated_at";

/// Document repository stored in a single SQLite file.
#[derive(Clone)]
pub struct SqliteDocumentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentRepository {
    /// Create or open the database at the given path, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| RepositoryError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let repo = Self::from_connection(Connection::open(path)?)?;
        tracing::info!(path = %path.display(), "Opened document database");
        Ok(repo)
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_type TEXT NOT NULL,
                storage_location TEXT NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_owner_id ON documents(owner_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            "#,
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Connection) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            op(&guard)
        })
        .await
        .map_err(|err| RepositoryError::Task(err.to_string()))?
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn create(&self, document: NewDocument) -> Result<DocumentRecord, RepositoryError> {
        let now = OffsetDateTime::now_utc();
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            owner_id: document.owner_id,
            filename: document.filename,
            content_type: document.content_type,
            storage_location: document.storage_location,
            status: DocumentStatus::Processing,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let stamp = format_timestamp(now)?;

        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (id, owner_id, filename, content_type, storage_location, \
                 status, error_message, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)",
                params![
                    row.id.to_string(),
                    row.owner_id,
                    row.filename,
                    row.content_type,
                    row.storage_location,
                    row.status.as_str(),
                    stamp,
                ],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(document_id = %record.id, owner_id = %record.owner_id, "Document record created");
        Ok(record)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError> {
        let error = normalize_error(status, error);
        let stamp = format_timestamp(OffsetDateTime::now_utc())?;

        let updated = self
            .with_conn(move |conn| {
                Ok(conn.execute(
                    "UPDATE documents SET status = ?1, error_message = ?2, updated_at = ?3 \
                     WHERE id = ?4",
                    params![status.as_str(), error, stamp, id.to_string()],
                )?)
            })
            .await?;

        if updated == 0 {
            tracing::debug!(document_id = %id, status = %status, "Status update skipped: document not found");
        } else {
            tracing::debug!(document_id = %id, status = %status, "Document status updated");
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRecord>, RepositoryError> {
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM documents WHERE id = ?1"),
                    params![id.to_string()],
                    RawRecord::from_row,
                )
                .optional()?;
            raw.map(RawRecord::into_record).transpose()
        })
        .await
    }

    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<DocumentRecord>, RepositoryError> {
        let owner_id = owner_id.to_string();
        self.with_conn(move |conn| {
            query_records(
                conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM documents WHERE owner_id = ?1 \
                     ORDER BY rowid DESC"
                ),
                &owner_id,
            )
        })
        .await
    }

    async fn list_by_status(
        &self,
        status: DocumentStatus,
    ) -> Result<Vec<DocumentRecord>, RepositoryError> {
        self.with_conn(move |conn| {
            query_records(
                conn,
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM documents WHERE status = ?1 ORDER BY rowid ASC"
                ),
                status.as_str(),
            )
        })
        .await
    }
}

fn query_records(
    conn: &Connection,
    sql: &str,
    param: &str,
) -> Result<Vec<DocumentRecord>, RepositoryError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![param], RawRecord::from_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

/// Column values as stored, before decoding ids, statuses and timestamps.
struct RawRecord {
    id: String,
    owner_id: String,
    filename: String,
    content_type: String,
    storage_location: String,
    status: String,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            filename: row.get(2)?,
            content_type: row.get(3)?,
            storage_location: row.get(4)?,
            status: row.get(5)?,
            error_message: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<DocumentRecord, RepositoryError> {
        Ok(DocumentRecord {
            id: Uuid::parse_str(&self.id)
                .map_err(|err| RepositoryError::Corrupt(format!("id '{}': {err}", self.id)))?,
            owner_id: self.owner_id,
            filename: self.filename,
            content_type: self.content_type,
            storage_location: self.storage_location,
            status: self.status.parse()?,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn format_timestamp(value: OffsetDateTime) -> Result<String, RepositoryError> {
    value
        .format(&Rfc3339)
        .map_err(|err| RepositoryError::Corrupt(format!("timestamp: {err}")))
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime, RepositoryError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map_err(|err| RepositoryError::Corrupt(format!("timestamp '{value}': {err}")))
}
