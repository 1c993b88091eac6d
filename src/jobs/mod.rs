//! In-process task queue and the job status gateway callers poll.

pub mod queue;
pub mod status;

pub use queue::{JobQueue, NativeTaskState, QueueError, TaskSnapshot};
pub use status::{JobStatus, JobStatusView, resolve};
