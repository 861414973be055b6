//! Error types for hardware detection.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by accelerator probes.
///
/// These never escape the service: a failed probe degrades to an empty
/// inventory.
#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    #[error("Hardware probe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Hardware probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }
}
