use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion outcomes.
#[derive(Default)]
pub struct IngestionMetrics {
    documents_completed: AtomicU64,
    documents_failed: AtomicU64,
    chunks_indexed: AtomicU64,
}

impl IngestionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a document that reached `completed` along with its chunk count.
    pub fn record_completed(&self, chunk_count: u64) {
        self.documents_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a job that ended in the `error` step.
    pub fn record_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_completed: self.documents_completed.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Jobs that finished with every chunk stored.
    pub documents_completed: u64,
    /// Jobs that aborted at any stage.
    pub documents_failed: u64,
    /// Total vector points written across completed documents.
    pub chunks_indexed: u64,
}
