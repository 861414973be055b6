//! Jobs, tasks and their derived status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::capability::{OptionMap, TrackKind};
use crate::profile::{EncodingProfile, PlanSummary};
use crate::progress::aggregate_percent;

pub type JobId = Uuid;
pub type TaskId = Uuid;

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unknown codec/container or invalid combination.
    Configuration,
    /// No eligible node.
    Capacity,
    /// Launch or network failure, retried.
    Transient,
    /// The encoder rejected the input or settings.
    Fatal,
    /// The overall task timeout elapsed.
    Timeout,
    Cancelled,
    /// The assembled output failed structural validation.
    OutputValidation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Capacity => "capacity",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::OutputValidation => "output_validation",
        }
    }
}

/// A terminal failure: category plus human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    PartiallyFailed,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::PartiallyFailed => "partially_failed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// What a task's output carries, for manifest assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Peak bandwidth in bits per second.
    pub bandwidth_bps: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framerate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One independently executable encode unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    /// Stable name within the job (`video-720p`, `audio-1-eng`).
    pub name: String,
    pub kind: TrackKind,
    /// Encoder id; a node must accept it to run the task.
    pub codec: String,
    /// Position in dispatch order; lower runs first.
    pub priority: u32,
    /// A failed required task fails the job.
    pub required: bool,
    pub input: PathBuf,
    pub output: PathBuf,
    /// Whether `output` is a media playlist with segments.
    pub segmented: bool,
    pub pre_input: OptionMap,
    pub options: OptionMap,
    pub stream: StreamInfo,
    /// Media duration used for progress.
    pub duration_secs: f64,

    pub status: TaskStatus,
    pub assigned_node: Option<String>,
    pub attempts: u32,
    pub last_error: Option<Failure>,
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(job_id: JobId, name: impl Into<String>, kind: TrackKind, codec: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            name: name.into(),
            kind,
            codec: codec.into(),
            priority: 0,
            required: true,
            input: PathBuf::new(),
            output: PathBuf::new(),
            segmented: false,
            pre_input: OptionMap::new(),
            options: OptionMap::new(),
            stream: StreamInfo::default(),
            duration_secs: 0.0,
            status: TaskStatus::Pending,
            assigned_node: None,
            attempts: 0,
            last_error: None,
            progress: 0.0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Whether the dispatcher ever picked this task up.
    pub fn has_started(&self) -> bool {
        self.attempts > 0 || self.status != TaskStatus::Pending
    }
}

/// State of the output assembly step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutputState {
    Pending,
    Finalized {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest: Option<PathBuf>,
    },
    Failed { failure: Failure },
    /// A required task failed; nothing was assembled.
    Skipped,
}

/// A transcode of one input with one profile snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingJob {
    pub id: JobId,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub profile: Arc<EncodingProfile>,
    pub plan: PlanSummary,
    pub tasks: Vec<Task>,
    pub output: OutputState,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EncodingJob {
    pub fn new(
        id: JobId,
        input: PathBuf,
        output_dir: PathBuf,
        profile: Arc<EncodingProfile>,
        plan: PlanSummary,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            id,
            input,
            output_dir,
            profile,
            plan,
            tasks,
            output: OutputState::Pending,
            cancelled: false,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Status derived from task outcomes and the output step.
    pub fn status(&self) -> JobStatus {
        if self.cancelled {
            return JobStatus::Cancelled;
        }
        if !self.tasks.is_empty() && !self.tasks.iter().any(Task::has_started) {
            return JobStatus::Queued;
        }
        if self.tasks.iter().any(|t| !t.status.is_terminal()) {
            return JobStatus::Running;
        }
        let required_failed = self
            .tasks
            .iter()
            .any(|t| t.required && t.status != TaskStatus::Succeeded);
        if required_failed {
            return JobStatus::Failed;
        }
        match self.output {
            OutputState::Pending => JobStatus::Running,
            OutputState::Failed { .. } | OutputState::Skipped => JobStatus::Failed,
            OutputState::Finalized { .. } => {
                if self.tasks.iter().any(|t| t.status != TaskStatus::Succeeded) {
                    JobStatus::PartiallyFailed
                } else {
                    JobStatus::Completed
                }
            }
        }
    }

    /// Task-count-weighted mean of task progress, in percent.
    pub fn progress(&self) -> f64 {
        let percents: Vec<f64> = self.tasks.iter().map(|t| t.progress).collect();
        aggregate_percent(&percents)
    }

    /// The failure that decided the job's outcome, if any.
    pub fn failure(&self) -> Option<Failure> {
        if let OutputState::Failed { ref failure } = self.output {
            return Some(failure.clone());
        }
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .min_by_key(|t| (!t.required, t.priority))
            .and_then(|t| t.last_error.clone())
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}
