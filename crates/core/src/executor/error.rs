//! Error types for task execution.

use std::path::PathBuf;
use thiserror::Error;

use crate::job::{Failure, FailureKind};

/// Errors that can end a task attempt.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The encoder process could not be started.
    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    /// The encoder binary does not exist on the node.
    #[error("Encoder binary not found: {path}")]
    EncoderNotFound { path: PathBuf },

    /// The encoder exited unsuccessfully.
    #[error("Encoder exited with code {}: {message}", .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    ProcessFailed {
        exit_code: Option<i32>,
        message: String,
        /// The encoder rejected its input or settings.
        fatal: bool,
    },

    /// The overall task timeout elapsed.
    #[error("Task timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("Task cancelled")]
    Cancelled,

    /// The node went away mid-attempt.
    #[error("Node unavailable: {node_id}")]
    NodeUnavailable { node_id: String },

    /// Exit status was success but nothing was written.
    #[error("Encoder reported success but output is missing: {path}")]
    OutputMissing { path: PathBuf },

    /// The task cannot run as described.
    #[error("Invalid task: {reason}")]
    InvalidTask { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    pub fn launch_failed(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LaunchFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn process_failed(exit_code: Option<i32>, message: impl Into<String>, fatal: bool) -> Self {
        Self::ProcessFailed {
            exit_code,
            message: message.into(),
            fatal,
        }
    }

    pub fn invalid_task(reason: impl Into<String>) -> Self {
        Self::InvalidTask {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::LaunchFailed { .. }
            | Self::NodeUnavailable { .. }
            | Self::OutputMissing { .. }
            | Self::Io(_) => FailureKind::Transient,
            Self::ProcessFailed { fatal: false, .. } => FailureKind::Transient,
            Self::ProcessFailed { fatal: true, .. } => FailureKind::Fatal,
            Self::EncoderNotFound { .. } | Self::InvalidTask { .. } => FailureKind::Configuration,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.kind(), self.to_string())
    }
}

/// stderr fragments that mean the encoder will never accept this task.
const FATAL_PATTERNS: &[&str] = &[
    "Unknown encoder",
    "Invalid data found",
    "not supported",
    "Unsupported",
    "No such file or directory",
    "Invalid argument",
];

/// Whether encoder output indicates a non-retryable failure.
pub fn is_fatal_output(stderr: &str) -> bool {
    FATAL_PATTERNS.iter().any(|p| stderr.contains(p))
}
