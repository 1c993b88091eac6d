//! Bounded job queue drained by a fixed pool of tokio workers.
//!
//! Finished tasks stay visible to pollers for a retention window and are then evicted.

use super::status::{JobStatusView, resolve};
use crate::pipeline::{IngestionJob, JobProgress, JobRunner, ProgressReporter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::Instant;
use uuid::Uuid;

/// How long a finished task stays queryable unless overridden.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Errors raised while enqueueing work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Every queue slot is taken.
    #[error("Ingestion queue is full")]
    Full,
    /// Workers have shut down.
    #[error("Ingestion queue is closed")]
    Closed,
}

/// State as the task queue itself sees it, independent of pipeline steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeTaskState {
    /// Enqueued, not yet picked up.
    Pending,
    /// A worker is running the job.
    Running,
    /// The runner returned success.
    Succeeded,
    /// The runner returned an error or panicked.
    Failed,
    /// Any state a different queue backend might report.
    Other(String),
}

/// Native state plus the last progress record the pipeline wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Queue-level state.
    pub state: NativeTaskState,
    /// Most recent progress record, if any.
    pub progress: Option<JobProgress>,
}

struct TaskEntry {
    snapshot: TaskSnapshot,
    finished_at: Option<Instant>,
}

impl TaskEntry {
    fn expired(&self, now: Instant, retention: Duration) -> bool {
        self.finished_at
            .is_some_and(|finished| now.saturating_duration_since(finished) >= retention)
    }
}

type TaskTable = Arc<RwLock<HashMap<Uuid, TaskEntry>>>;

struct QueuedJob {
    id: Uuid,
    job: IngestionJob,
}

/// Handle for submitting jobs and reading their state.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    tasks: TaskTable,
    retention: Duration,
}

impl JobQueue {
    /// Spawn `workers` tasks that run queued jobs through `runner`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(runner: Arc<dyn JobRunner>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let tasks: TaskTable = Arc::default();

        for worker_id in 0..workers.max(1) {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&receiver),
                Arc::clone(&tasks),
                Arc::clone(&runner),
            ));
        }
        tracing::info!(workers, capacity, "Ingestion workers started");

        Self {
            sender,
            tasks,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep finished tasks queryable for `retention` instead of [`DEFAULT_RETENTION`].
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Enqueue a job and return its id. Fails immediately when the queue is full.
    pub async fn submit(&self, job: IngestionJob) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        {
            let mut tasks = self.tasks.write().await;
            let now = Instant::now();
            let before = tasks.len();
            tasks.retain(|_, entry| !entry.expired(now, self.retention));
            let evicted = before - tasks.len();
            if evicted > 0 {
                tracing::debug!(evicted, "Evicted finished ingestion tasks");
            }
            tasks.insert(
                id,
                TaskEntry {
                    snapshot: TaskSnapshot {
                        state: NativeTaskState::Pending,
                        progress: None,
                    },
                    finished_at: None,
                },
            );
        }

        if let Err(err) = self.sender.try_send(QueuedJob { id, job }) {
            self.tasks.write().await.remove(&id);
            let error = match err {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            };
            tracing::warn!(error = %error, "Rejected ingestion job");
            return Err(error);
        }

        tracing::debug!(task_id = %id, "Ingestion job enqueued");
        Ok(id)
    }

    /// Raw queue state for a job. Finished tasks past the retention window read as unknown.
    pub async fn snapshot(&self, id: Uuid) -> Option<TaskSnapshot> {
        let now = Instant::now();
        {
            let tasks = self.tasks.read().await;
            let entry = tasks.get(&id)?;
            if !entry.expired(now, self.retention) {
                return Some(entry.snapshot.clone());
            }
        }
        let mut tasks = self.tasks.write().await;
        if tasks
            .get(&id)
            .is_some_and(|entry| entry.expired(now, self.retention))
        {
            tasks.remove(&id);
        }
        None
    }

    /// Caller-facing status for a job, or `None` for an unknown id.
    pub async fn status(&self, id: Uuid) -> Option<JobStatusView> {
        self.snapshot(id).await.map(|snapshot| resolve(&snapshot))
    }

    /// Number of tasks currently tracked, finished ones included.
    pub async fn tracked(&self) -> usize {
        self.tasks.read().await.len()
    }
}

/// Writes progress records into the shared task table.
struct TaskProgressReporter {
    id: Uuid,
    tasks: TaskTable,
}

#[async_trait]
impl ProgressReporter for TaskProgressReporter {
    async fn report(&self, progress: JobProgress) {
        tracing::debug!(
            task_id = %self.id,
            step = %progress.step,
            progress = progress.progress,
            "Job progress"
        );
        if let Some(task) = self.tasks.write().await.get_mut(&self.id) {
            task.snapshot.progress = Some(progress);
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    tasks: TaskTable,
    runner: Arc<dyn JobRunner>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { id, job }) = next else {
            tracing::debug!(worker_id, "Ingestion worker stopping");
            break;
        };

        set_state(&tasks, id, NativeTaskState::Running, None).await;
        tracing::info!(worker_id, task_id = %id, filename = %job.filename, "Ingestion job started");

        let reporter: Arc<dyn ProgressReporter> = Arc::new(TaskProgressReporter {
            id,
            tasks: Arc::clone(&tasks),
        });
        let job_runner = Arc::clone(&runner);
        let handle = tokio::spawn(async move { job_runner.run_job(job, reporter).await });

        match handle.await {
            Ok(Ok(outcome)) => {
                set_state(&tasks, id, NativeTaskState::Succeeded, None).await;
                tracing::info!(
                    worker_id,
                    task_id = %id,
                    document_id = %outcome.document_id,
                    "Ingestion job succeeded"
                );
            }
            Ok(Err(error)) => {
                let record = JobProgress::failed(error.to_string());
                set_state(&tasks, id, NativeTaskState::Failed, Some(record)).await;
                tracing::warn!(worker_id, task_id = %id, error = %error, "Ingestion job failed");
            }
            Err(join_error) => {
                set_state(&tasks, id, NativeTaskState::Failed, None).await;
                tracing::error!(worker_id, task_id = %id, error = %join_error, "Ingestion job panicked");
            }
        }
    }
}

async fn set_state(
    tasks: &TaskTable,
    id: Uuid,
    state: NativeTaskState,
    progress: Option<JobProgress>,
) {
    if let Some(task) = tasks.write().await.get_mut(&id) {
        if matches!(state, NativeTaskState::Succeeded | NativeTaskState::Failed) {
            task.finished_at = Some(Instant::now());
        }
        task.snapshot.state = state;
        if progress.is_some() {
            task.snapshot.progress = progress;
        }
    }
}
