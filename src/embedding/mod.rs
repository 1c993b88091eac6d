use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("Embedding provider returned {status}: {body}")]
    Provider {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Vectors within one batch disagree on dimensionality.
    #[error("Embedding dimension changed within a batch: expected {expected}, got {actual}")]
    InconsistentDimension {
        /// Dimension of the first vector.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Batch-level contract on top of any [`EmbeddingClient`].
///
/// One provider call per batch. Empty batches short-circuit, and every response is checked for
/// length and a single shared dimension before it reaches the caller.
pub struct EmbeddingGenerator {
    client: Box<dyn EmbeddingClient>,
}

impl EmbeddingGenerator {
    /// Wrap a concrete client.
    pub fn new(client: Box<dyn EmbeddingClient>) -> Self {
        Self { client }
    }

    /// Build the generator for the configured provider.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        Ok(Self::new(build_embedding_client(config)?))
    }

    /// Embed a batch, returning exactly one vector per text in the same order.
    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let vectors = self.client.generate_embeddings(texts).await?;
        if vectors.len() != expected {
            return Err(EmbeddingClientError::CountMismatch {
                expected,
                actual: vectors.len(),
            });
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "provider returned an empty vector".to_string(),
            ));
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(EmbeddingClientError::InconsistentDimension {
                expected: dimension,
                actual: vector.len(),
            });
        }

        tracing::debug!(count = expected, dimension, "Generated embeddings");
        Ok(vectors)
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    let client: Box<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::GenerationFailed("OPENAI_API_KEY is not set".to_string())
            })?;
            Box::new(OpenAiEmbeddingClient::new(
                &config.openai_base_url,
                api_key,
                &config.embedding_model,
            )?)
        }
        EmbeddingProvider::Ollama => Box::new(OllamaEmbeddingClient::new(
            &config.ollama_url,
            &config.embedding_model,
        )?),
        EmbeddingProvider::Local => Box::new(HashEmbeddingClient::new(config.embedding_dimension)),
    };

    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        "Initialized embedding client"
    );
    Ok(client)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingDatum>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbeddingClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Create a client targeting `{base_url}/embeddings`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            client: http_client()?,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: &texts,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let mut payload: OpenAiEmbeddingResponse = response.json().await?;
        // Correlate by the echoed index, never by arrival order.
        payload.data.sort_by_key(|datum| datum.index);
        Ok(payload
            .data
            .into_iter()
            .map(|datum| datum.embedding)
            .collect())
    }
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for the Ollama `/api/embed` endpoint.
pub struct OllamaEmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client targeting `{base_url}/api/embed`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, EmbeddingClientError> {
        Ok(Self {
            client: http_client()?,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: &texts,
            })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload: OllamaEmbeddingResponse = response.json().await?;
        Ok(payload.embeddings)
    }
}

/// Deterministic offline embedding client: a normalized byte histogram.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Construct a client producing vectors of `dimension` floats.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

fn http_client() -> Result<Client, EmbeddingClientError> {
    Ok(Client::builder().user_agent("ragingest/0.1").build()?)
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, EmbeddingClientError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = EmbeddingClientError::Provider { status, body };
    tracing::error!(error = %error, "Embedding request failed");
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: Arc<AtomicUsize>,
        response: Vec<Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingClient for CountingClient {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn counting(response: Vec<Vec<f32>>) -> (EmbeddingGenerator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = CountingClient {
            calls: Arc::clone(&calls),
            response,
        };
        (EmbeddingGenerator::new(Box::new(client)), calls)
    }

    #[tokio::test]
    async fn empty_batch_skips_the_provider() {
        let (generator, calls) = counting(vec![vec![1.0]]);
        let vectors = generator.embed(Vec::new()).await.expect("empty batch");
        assert!(vectors.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn count_mismatch_is_rejected() {
        let (generator, calls) = counting(vec![vec![1.0, 0.0]]);
        let error = generator
            .embed(vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            EmbeddingClientError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mixed_dimensions_are_rejected() {
        let (generator, _) = counting(vec![vec![1.0, 0.0], vec![1.0]]);
        let error = generator
            .embed(vec!["a".into(), "b".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            EmbeddingClientError::InconsistentDimension {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn hash_client_is_deterministic_and_normalized() {
        let generator = EmbeddingGenerator::new(Box::new(HashEmbeddingClient::new(8)));
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = generator.embed(texts).await.expect("hash embeddings");

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|vector| vector.len() == 8));
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        let norm: f32 = vectors[0].iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn openai_results_are_reordered_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings").json_body(json!({
                    "model": "text-embedding-3-small",
                    "input": ["first", "second"]
                }));
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            &format!("{}/v1/", server.base_url()),
            "sk-test",
            "text-embedding-3-small",
        )
        .expect("client");
        let vectors = client
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn provider_errors_surface_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(429).body("rate limited");
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            &format!("{}/v1", server.base_url()),
            "sk-test",
            "text-embedding-3-small",
        )
        .expect("client");
        let error = client
            .generate_embeddings(vec!["text".into()])
            .await
            .unwrap_err();

        match error {
            EmbeddingClientError::Provider { status, body } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ollama_client_reads_embeddings_array() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed").json_body(json!({
                    "model": "nomic-embed-text",
                    "input": ["one"]
                }));
                then.status(200).json_body(json!({
                    "model": "nomic-embed-text",
                    "embeddings": [[0.5, 0.25, 0.25]]
                }));
            })
            .await;

        let client =
            OllamaEmbeddingClient::new(&server.base_url(), "nomic-embed-text").expect("client");
        let vectors = client
            .generate_embeddings(vec!["one".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.5, 0.25, 0.25]]);
    }

    #[test]
    fn openai_provider_requires_api_key() {
        let mut config = crate::config::test_config();
        config.embedding_provider = EmbeddingProvider::OpenAI;
        config.openai_api_key = None;
        assert!(build_embedding_client(&config).is_err());
    }
}
