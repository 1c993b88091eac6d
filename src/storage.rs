//! Raw document storage on the local filesystem.

use crate::config::Config;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while storing or reading raw document bytes.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// Filesystem operation failed.
    #[error("Storage I/O failed for '{location}': {source}")]
    Io {
        /// Path involved in the failing operation.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Location does not belong to this store.
    #[error("Storage location '{0}' is outside the storage root")]
    OutsideRoot(String),
}

/// Writer and reader for uploaded bytes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Persist `bytes` for `owner_id`, returning an opaque storage location.
    async fn save(
        &self,
        bytes: &[u8],
        owner_id: &str,
        filename: &str,
    ) -> Result<String, ObjectStoreError>;

    /// Load the bytes previously stored at `location`.
    async fn read(&self, location: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Delete the bytes at `location`. Missing objects are not an error.
    async fn remove(&self, location: &str) -> Result<(), ObjectStoreError>;
}

/// Stores files as `{root}/{owner}/{uuid}_{filename}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Store rooted at `STORAGE_PATH`.
    pub fn new(config: &Config) -> Self {
        Self::with_root(config.storage_path.clone())
    }

    /// Store rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve<'a>(&self, location: &'a str) -> Result<&'a Path, ObjectStoreError> {
        let path = Path::new(location);
        if path.starts_with(&self.root) {
            Ok(path)
        } else {
            Err(ObjectStoreError::OutsideRoot(location.to_string()))
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn save(
        &self,
        bytes: &[u8],
        owner_id: &str,
        filename: &str,
    ) -> Result<String, ObjectStoreError> {
        let dir = self.root.join(sanitize_component(owner_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;

        let path = dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_component(filename)));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| io_error(&path, source))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.resolve(location)?;
        tokio::fs::read(path)
            .await
            .map_err(|source| io_error(path, source))
    }

    async fn remove(&self, location: &str) -> Result<(), ObjectStoreError> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed stored upload");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(path, source)),
        }
    }
}

/// Reduce a user-supplied name to a single safe path component.
fn sanitize_component(value: &str) -> String {
    let base = value.rsplit(['/', '\\']).next().unwrap_or(value);
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Io {
        location: path.display().to_string(),
        source,
    }
}
