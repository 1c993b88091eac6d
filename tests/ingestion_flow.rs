use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::{
    Method::{GET, PUT},
    MockServer,
};
use parking_lot::Mutex;
use ragingest::{
    documents::{DocumentRepository, DocumentStatus, SqliteDocumentRepository},
    embedding::{EmbeddingClient, EmbeddingClientError, EmbeddingGenerator, HashEmbeddingClient},
    extraction::ExtractorRegistry,
    jobs::{JobQueue, JobStatus, JobStatusView, QueueError},
    metrics::IngestionMetrics,
    pipeline::{
        IngestionError, IngestionJob, IngestionPipeline, LoggingReporter, PipelineComponents,
    },
    qdrant::{QdrantError, QdrantService, SearchHit, VectorPoint, VectorStore},
    service::{IngestionApi, IngestionService, UploadError, submit_with_backoff},
    storage::{LocalObjectStore, ObjectStore},
};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Default)]
struct MemoryVectorStore {
    collections: Mutex<Vec<(String, u64)>>,
    points: Mutex<Vec<VectorPoint>>,
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn ensure_collection(&self, name: &str, vector_size: u64) -> Result<(), QdrantError> {
        let mut collections = self.collections.lock();
        if let Some((_, actual)) = collections.iter().find(|(existing, _)| existing == name) {
            if *actual != vector_size {
                return Err(QdrantError::GeometryMismatch {
                    collection: name.to_string(),
                    expected: vector_size,
                    actual: *actual,
                });
            }
            return Ok(());
        }
        collections.push((name.to_string(), vector_size));
        Ok(())
    }

    async fn upsert(
        &self,
        _collection: &str,
        points: Vec<VectorPoint>,
    ) -> Result<usize, QdrantError> {
        let count = points.len();
        self.points.lock().extend(points);
        Ok(count)
    }

    async fn search(
        &self,
        _collection: &str,
        owner_id: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, QdrantError> {
        let mut hits: Vec<SearchHit> = self
            .points
            .lock()
            .iter()
            .filter(|point| point.payload.owner_id == owner_id)
            .map(|point| SearchHit {
                score: point.vector.iter().zip(&vector).map(|(a, b)| a * b).sum(),
                payload: point.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

struct FailingEmbeddings;

#[async_trait]
impl EmbeddingClient for FailingEmbeddings {
    async fn generate_embeddings(
        &self,
        _texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Err(EmbeddingClientError::GenerationFailed(
            "provider timed out".to_string(),
        ))
    }
}

struct StalledEmbeddings;

#[async_trait]
impl EmbeddingClient for StalledEmbeddings {
    async fn generate_embeddings(
        &self,
        _texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        std::future::pending().await
    }
}

struct Harness {
    pipeline: Arc<IngestionPipeline>,
    vectors: Arc<dyn VectorStore>,
    documents: Arc<SqliteDocumentRepository>,
    objects: Arc<LocalObjectStore>,
    _dir: TempDir,
}

fn harness(
    vectors: Arc<dyn VectorStore>,
    embeddings: Box<dyn EmbeddingClient>,
    chunk_size: usize,
) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let documents = Arc::new(SqliteDocumentRepository::open_in_memory().expect("db"));
    let objects = Arc::new(LocalObjectStore::with_root(dir.path()));
    let pipeline = Arc::new(IngestionPipeline::new(PipelineComponents {
        extractors: ExtractorRegistry::default(),
        chunk_size,
        chunk_overlap: 20,
        embedder: EmbeddingGenerator::new(embeddings),
        vectors: Arc::clone(&vectors),
        documents: documents.clone(),
        objects: objects.clone(),
        collection: "documents".into(),
        access_level: "admin".into(),
        metrics: Arc::new(IngestionMetrics::new()),
    }));
    Harness {
        pipeline,
        vectors,
        documents,
        objects,
        _dir: dir,
    }
}

async fn stored_job(harness: &Harness, owner: &str, text: &str) -> IngestionJob {
    let storage_location = harness
        .objects
        .save(text.as_bytes(), owner, "doc.txt")
        .await
        .expect("save");
    IngestionJob {
        storage_location,
        owner_id: owner.into(),
        filename: "doc.txt".into(),
        content_type: "text/plain".into(),
    }
}

async fn wait_terminal(queue: &JobQueue, id: Uuid) -> JobStatusView {
    for _ in 0..300 {
        if let Some(view) = queue.status(id).await
            && view.status.is_terminal()
        {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never finished");
}

#[tokio::test]
async fn short_text_document_completes_with_one_point() {
    let store = Arc::new(MemoryVectorStore::default());
    let harness = harness(store.clone(), Box::new(HashEmbeddingClient::new(16)), 100);
    let text = "Fifty characters of plain text in a short memo: ok";
    assert_eq!(text.chars().count(), 50);
    let job = stored_job(&harness, "alice", text).await;

    let outcome = harness
        .pipeline
        .run(&job, &LoggingReporter)
        .await
        .expect("ingestion");

    assert_eq!(outcome.chunk_count, 1);
    let record = harness
        .documents
        .get(outcome.document_id)
        .await
        .expect("get")
        .expect("record");
    assert_eq!(record.status, DocumentStatus::Completed);
    assert_eq!(record.error_message, None);

    let points = store.points.lock();
    assert_eq!(points.len(), 1);
    let payload = &points[0].payload;
    assert_eq!(payload.page_number, 1);
    assert_eq!(payload.chunk_index, 0);
    assert_eq!(payload.owner_id, "alice");
    assert_eq!(payload.document_id, outcome.document_id.to_string());
    assert_eq!(payload.text, text);
    assert_eq!(
        store.collections.lock().clone(),
        vec![("documents".to_string(), 16)]
    );
}

#[tokio::test]
async fn blank_document_fails_without_a_record() {
    let store = Arc::new(MemoryVectorStore::default());
    let harness = harness(store.clone(), Box::new(HashEmbeddingClient::new(16)), 100);
    let job = stored_job(&harness, "bob", "   \n\t  \n").await;

    let error = harness
        .pipeline
        .run(&job, &LoggingReporter)
        .await
        .unwrap_err();

    assert!(matches!(error, IngestionError::NoExtractableContent));
    assert_eq!(error.to_string(), "No extractable content found in document");
    assert!(harness.documents.list_for_owner("bob").await.expect("list").is_empty());
    assert!(store.points.lock().is_empty());
}

#[tokio::test]
async fn embedding_failure_marks_document_and_job_failed() {
    let store = Arc::new(MemoryVectorStore::default());
    let harness = harness(store.clone(), Box::new(FailingEmbeddings), 100);
    let job = stored_job(&harness, "carol", "Some perfectly fine text.").await;

    let queue = JobQueue::start(harness.pipeline.clone(), 1, 4);
    let task_id = queue.submit(job).await.expect("submit");
    let view = wait_terminal(&queue, task_id).await;

    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.step.as_deref(), Some("error"));
    let message = view.error.expect("error message");
    assert!(message.contains("provider timed out"), "{message}");

    let records = harness.documents.list_for_owner("carol").await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DocumentStatus::Failed);
    assert_eq!(records[0].error_message.as_deref(), Some(message.as_str()));
    assert!(store.points.lock().is_empty());
}

#[tokio::test]
async fn second_model_with_other_dimension_is_rejected() {
    let store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::default());
    let first = harness(Arc::clone(&store), Box::new(HashEmbeddingClient::new(16)), 100);
    let job = stored_job(&first, "dave", "first document").await;
    first.pipeline.run(&job, &LoggingReporter).await.expect("first run");

    let second = harness(Arc::clone(&first.vectors), Box::new(HashEmbeddingClient::new(32)), 100);
    let job = stored_job(&second, "dave", "second document").await;
    let error = second
        .pipeline
        .run(&job, &LoggingReporter)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        IngestionError::CollectionGeometryMismatch {
            expected: 32,
            actual: 16,
            ..
        }
    ));
    let failed = second
        .documents
        .list_by_status(DocumentStatus::Failed)
        .await
        .expect("list");
    assert_eq!(failed.len(), 1);
}

#[tokio::test]
async fn upload_to_completion_against_qdrant_http() {
    let server = MockServer::start_async().await;
    let lookup = server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/documents");
            then.status(404)
                .json_body(json!({ "status": { "error": "Not found: Collection `documents` doesn't exist!" } }));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/documents").json_body(json!({
                "vectors": { "size": 16, "distance": "Cosine" }
            }));
            then.status(200).json_body(json!({ "result": true, "status": "ok" }));
        })
        .await;
    let indexes = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/documents/index");
            then.status(200)
                .json_body(json!({ "result": { "status": "acknowledged" }, "status": "ok" }));
        })
        .await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/documents/points")
                .query_param("wait", "true")
                .body_contains("\"owner_id\":\"erin\"")
                .body_contains("\"access_level\":\"admin\"");
            then.status(200)
                .json_body(json!({ "result": { "operation_id": 7, "status": "completed" }, "status": "ok" }));
        })
        .await;

    let qdrant = QdrantService::with_endpoint(&server.base_url(), None).expect("qdrant client");
    let harness = harness(Arc::new(qdrant), Box::new(HashEmbeddingClient::new(16)), 100);
    let service = IngestionService::start("ragingest-test", harness.pipeline.clone(), 2, 8);

    let text = "Quarterly report. ".repeat(20);
    let task_id = service
        .submit_upload("erin", "report.txt", text.into_bytes())
        .await
        .expect("upload accepted");
    let view = wait_terminal(service.queue(), task_id).await;

    assert_eq!(view.status, JobStatus::Completed, "{view:?}");
    assert_eq!(view.progress, 100);
    lookup.assert_async().await;
    create.assert_async().await;
    indexes.assert_hits_async(2).await;
    upsert.assert_async().await;

    let documents = service.list_documents("erin").await.expect("list");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].status, DocumentStatus::Completed);
    assert_eq!(documents[0].content_type, "text/plain");

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.documents_completed, 1);
    assert!(snapshot.chunks_indexed > 1);
}

#[tokio::test]
async fn unsupported_upload_never_reaches_the_queue() {
    let harness = harness(
        Arc::new(MemoryVectorStore::default()),
        Box::new(HashEmbeddingClient::new(16)),
        100,
    );
    let service = IngestionService::start("ragingest-test", harness.pipeline.clone(), 1, 2);

    let error = service
        .submit_upload("frank", "image.png", vec![0x89, b'P', b'N', b'G', 0xFF])
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Unsupported"), "{error}");
    assert!(
        std::fs::read_dir(harness.objects.root())
            .expect("root")
            .next()
            .is_none()
    );
}

#[tokio::test]
async fn search_never_returns_another_owners_chunks() {
    let store = Arc::new(MemoryVectorStore::default());
    let harness = harness(store.clone(), Box::new(HashEmbeddingClient::new(16)), 100);
    let text = "Shared wording about the merger timeline.";
    for owner in ["alice", "mallory"] {
        let job = stored_job(&harness, owner, text).await;
        harness
            .pipeline
            .run(&job, &LoggingReporter)
            .await
            .expect("ingestion");
    }
    assert_eq!(store.points.lock().len(), 2);

    let hits = harness
        .pipeline
        .search("alice", text, 10)
        .await
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert!(hits.iter().all(|hit| hit.payload.owner_id == "alice"));
    assert_eq!(hits[0].payload.text, text);

    let stranger = harness
        .pipeline
        .search("nobody", text, 10)
        .await
        .expect("search");
    assert!(stranger.is_empty());
}

#[tokio::test]
async fn rejected_enqueue_removes_the_stored_upload() {
    let harness = harness(
        Arc::new(MemoryVectorStore::default()),
        Box::new(StalledEmbeddings),
        100,
    );
    let service = IngestionService::start("ragingest-test", harness.pipeline.clone(), 1, 1);

    let mut accepted = 0usize;
    let mut full = 0usize;
    for n in 0..4 {
        match service
            .submit_upload("gina", &format!("note-{n}.txt"), b"queued text".to_vec())
            .await
        {
            Ok(_) => accepted += 1,
            Err(UploadError::Queue(QueueError::Full)) => full += 1,
            Err(other) => panic!("unexpected upload error: {other}"),
        }
    }

    assert!(full >= 2, "accepted {accepted}, full {full}");
    let stored = std::fs::read_dir(harness.objects.root().join("gina"))
        .expect("owner dir")
        .count();
    assert_eq!(stored, accepted);
}

#[tokio::test]
async fn backoff_submits_every_file_through_a_tiny_queue() {
    let harness = harness(
        Arc::new(MemoryVectorStore::default()),
        Box::new(HashEmbeddingClient::new(16)),
        100,
    );
    let service = IngestionService::start("ragingest-test", harness.pipeline.clone(), 1, 1);

    let mut task_ids = Vec::new();
    for n in 0..6 {
        let id = submit_with_backoff(
            &service,
            "hank",
            &format!("memo-{n}.txt"),
            format!("Memo number {n} body text.").into_bytes(),
            Duration::from_millis(5),
        )
        .await
        .expect("eventually accepted");
        task_ids.push(id);
    }

    for id in task_ids {
        let view = wait_terminal(service.queue(), id).await;
        assert_eq!(view.status, JobStatus::Completed, "{view:?}");
    }
    assert_eq!(service.metrics_snapshot().documents_completed, 6);
}
