//! Encoding jobs and tasks.
//!
//! Job status is never stored: it is derived from task outcomes and the
//! output step by [`EncodingJob::status`].

mod store;
mod types;

pub use store::{InMemoryJobStore, JobStore};
pub use types::{
    EncodingJob, Failure, FailureKind, JobId, JobStatus, OutputState, StreamInfo, Task, TaskId,
    TaskStatus,
};
