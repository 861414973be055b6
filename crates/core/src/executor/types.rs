//! Events and per-attempt context.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::command::CommandLine;
use crate::job::{Failure, JobId, JobStatus, Task, TaskId, TaskStatus};
use crate::progress::ProgressUpdate;
use crate::registry::EncoderNode;

/// Lifecycle notifications for subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    TaskAssigned {
        job_id: JobId,
        task_id: TaskId,
        node_id: String,
        attempt: u32,
    },
    TaskStarted {
        job_id: JobId,
        task_id: TaskId,
        node_id: String,
        attempt: u32,
        command: String,
    },
    TaskProgress {
        job_id: JobId,
        task_id: TaskId,
        update: ProgressUpdate,
        job_percent: f64,
    },
    TaskRetrying {
        job_id: JobId,
        task_id: TaskId,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    TaskFinished {
        job_id: JobId,
        task_id: TaskId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<Failure>,
    },
    JobFinished {
        job_id: JobId,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<Failure>,
    },
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::TaskAssigned { job_id, .. }
            | Self::TaskStarted { job_id, .. }
            | Self::TaskProgress { job_id, .. }
            | Self::TaskRetrying { job_id, .. }
            | Self::TaskFinished { job_id, .. }
            | Self::JobFinished { job_id, .. } => *job_id,
        }
    }
}

/// Everything a runner needs for one attempt.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task snapshot at dispatch time.
    pub task: Task,
    pub node: EncoderNode,
    pub command: CommandLine,
    /// 1-based.
    pub attempt: u32,
    /// Progress sink; sends are best effort.
    pub progress: mpsc::Sender<ProgressUpdate>,
    pub progress_interval: Duration,
    /// Fires when the job is cancelled.
    pub cancel: CancellationToken,
}
