use std::{env, sync::Once};

use ragingest::{
    config::{self, Config},
    embedding::build_embedding_client,
    qdrant::{QdrantService, VectorStore},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn live_config() -> Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION_NAME", "ragingest-live");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "nomic-embed-text");
        set_default_env("EMBEDDING_DIMENSION", "768");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
    });
    config::load().expect("live configuration")
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_collection_is_idempotent() {
    let config = live_config();
    let service = QdrantService::new(&config).expect("qdrant client");
    let size = config.embedding_dimension as u64;

    service
        .ensure_collection(&config.qdrant_collection_name, size)
        .await
        .expect("first ensure");
    service
        .ensure_collection(&config.qdrant_collection_name, size)
        .await
        .expect("second ensure");

    let actual = service
        .collection_vector_size(&config.qdrant_collection_name)
        .await
        .expect("lookup");
    assert_eq!(actual, Some(size));
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_roundtrip() {
    let config = live_config();
    let client = build_embedding_client(&config).expect("embedding client");
    let vectors = client
        .generate_embeddings(vec!["ragingest live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}
