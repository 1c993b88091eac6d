//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::payload::point_to_json;
use crate::qdrant::types::{
    CollectionInfoResponse, QdrantError, SearchHit, SearchResponse, VectorPoint, VectorStore,
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

const PAYLOAD_INDEXES: [&str; 2] = ["owner_id", "document_id"];

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client from the supplied configuration.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        Self::with_endpoint(&config.qdrant_url, config.qdrant_api_key.clone())
    }

    /// Construct a client for an explicit endpoint.
    pub fn with_endpoint(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("ragingest/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Vector size of an existing collection, or `None` when it does not exist.
    pub async fn collection_vector_size(
        &self,
        collection_name: &str,
    ) -> Result<Option<u64>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                let size = info.result.config.params.vectors.size().ok_or_else(|| {
                    QdrantError::MalformedResponse(format!(
                        "collection '{collection_name}' has no single vector size"
                    ))
                })?;
                Ok(Some(size))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = collection_name, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    /// Create a collection with the given vector size and cosine distance.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, vector_size, "Collection created");
        })
        .await
    }

    /// Ensure keyword payload indexes exist for owner and document filters.
    ///
    /// Failures are logged and swallowed; a missing index slows queries but loses no data.
    pub async fn ensure_payload_indexes(&self, collection_name: &str) {
        for field in PAYLOAD_INDEXES {
            let body = json!({
                "field_name": field,
                "field_schema": "keyword",
            });

            let result = self
                .request(Method::PUT, &format!("collections/{collection_name}/index"))
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(collection = collection_name, field, "Payload index ensured");
                }
                Ok(response) if response.status() == StatusCode::CONFLICT => {
                    tracing::debug!(
                        collection = collection_name,
                        field,
                        "Payload index already exists"
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    let error = QdrantError::UnexpectedStatus { status, body };
                    tracing::warn!(collection = collection_name, field, error = %error, "Failed to ensure payload index");
                }
                Err(err) => {
                    tracing::warn!(collection = collection_name, field, error = %err, "Failed to ensure payload index");
                }
            }
        }
    }

    /// Create a collection that a lookup reported missing. When the create call fails because a
    /// concurrent job created it first, the winner's geometry is verified instead.
    async fn create_or_adopt(&self, name: &str, vector_size: u64) -> Result<(), QdrantError> {
        tracing::debug!(collection = name, vector_size, "Creating collection");
        if let Err(create_error) = self.create_collection(name, vector_size).await {
            return match self.collection_vector_size(name).await? {
                Some(actual) => {
                    tracing::debug!(collection = name, "Collection created concurrently");
                    Self::check_geometry(name, vector_size, actual)
                }
                None => Err(create_error),
            };
        }

        self.ensure_payload_indexes(name).await;
        Ok(())
    }

    fn check_geometry(collection: &str, expected: u64, actual: u64) -> Result<(), QdrantError> {
        if expected == actual {
            return Ok(());
        }
        let error = QdrantError::GeometryMismatch {
            collection: collection.to_string(),
            expected,
            actual,
        };
        tracing::error!(error = %error, "Collection geometry mismatch");
        Err(error)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), QdrantError> {
        if let Some(actual) = self.collection_vector_size(name).await? {
            return Self::check_geometry(name, vector_size, actual);
        }

        self.create_or_adopt(name, vector_size).await
    }

    async fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<usize, QdrantError> {
        if points.is_empty() {
            return Ok(0);
        }

        let serialized: Vec<Value> = points.into_iter().map(point_to_json).collect();
        let point_count = serialized.len();
        let response = self
            .request(Method::PUT, &format!("collections/{collection}/points"))
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection, points = point_count, "Points upserted");
        })
        .await?;

        Ok(point_count)
    }

    async fn search(
        &self,
        collection: &str,
        owner_id: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, QdrantError> {
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
            "filter": {
                "must": [
                    { "key": "owner_id", "match": { "value": owner_id } }
                ]
            }
        });
        let response = self
            .request(Method::POST, &format!("collections/{collection}/points/search"))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let parsed: SearchResponse = response.json().await?;
                tracing::debug!(collection, owner_id, hits = parsed.result.len(), "Search completed");
                Ok(parsed.result)
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!(collection, "Search against a missing collection");
                Ok(Vec::new())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection, error = %error, "Search failed");
                Err(error)
            }
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
