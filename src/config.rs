use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ingestion service.
///
/// Built once at startup and handed by reference to every component constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Human-readable service name reported by `/health`.
    pub app_name: String,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the single Qdrant collection holding every user's points.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the offline `local` provider.
    pub embedding_dimension: usize,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible embedding endpoints.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks of the same page.
    pub chunk_overlap: usize,
    /// Access qualifier written into every vector payload.
    pub access_level: String,
    /// SQLite database file backing the document repository.
    pub database_path: PathBuf,
    /// Root directory for uploaded raw documents.
    pub storage_path: PathBuf,
    /// Number of concurrent ingestion workers.
    pub worker_count: usize,
    /// Maximum number of jobs waiting in the queue.
    pub queue_capacity: usize,
    /// Upper bound on accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Seconds a finished job stays visible to status polling.
    pub job_retention_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic in-process hashing, no network.
    Local,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            app_name: load_env_or("APP_NAME", "ragingest"),
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", "documents"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_or("EMBEDDING_PROVIDER", "openai")
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            ollama_url: load_env_or("OLLAMA_URL", "http://127.0.0.1:11434"),
            chunk_size: parse_env_or("CHUNK_SIZE", 1500)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200)?,
            access_level: load_env_or("ACCESS_LEVEL", "admin"),
            database_path: PathBuf::from(load_env_or("DATABASE_PATH", "data/documents.db")),
            storage_path: PathBuf::from(load_env_or("STORAGE_PATH", "data/uploads")),
            worker_count: parse_env_or("INGEST_WORKERS", 2)?,
            queue_capacity: parse_env_or("INGEST_QUEUE_CAPACITY", 1000)?,
            max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            job_retention_secs: parse_env_or("JOB_RETENTION_SECS", 3600)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that could never produce a working pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue("INGEST_WORKERS".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("INGEST_QUEUE_CAPACITY".into()));
        }
        if self.embedding_provider == EmbeddingProvider::Local && self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        Ok(())
    }
}

/// Load `.env` (when present) and build a [`Config`] from the process environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        model = %config.embedding_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        workers = config.worker_count,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        app_name: "ragingest-test".into(),
        qdrant_url: "http://127.0.0.1:6333".into(),
        qdrant_collection_name: "documents".into(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Local,
        embedding_model: "hash".into(),
        embedding_dimension: 8,
        openai_api_key: None,
        openai_base_url: "https://api.openai.com/v1".into(),
        ollama_url: "http://127.0.0.1:11434".into(),
        chunk_size: 100,
        chunk_overlap: 20,
        access_level: "admin".into(),
        database_path: PathBuf::from(":memory:"),
        storage_path: PathBuf::from("data/uploads"),
        worker_count: 1,
        queue_capacity: 16,
        max_upload_bytes: 1024 * 1024,
        job_retention_secs: 60,
        server_port: None,
    }
}
