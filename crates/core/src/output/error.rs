use std::path::PathBuf;
use thiserror::Error;

use crate::job::{Failure, FailureKind};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to read playlist {path}: {reason}")]
    PlaylistUnreadable { path: PathBuf, reason: String },

    #[error("Output validation failed: {}", .violations.join("; "))]
    Invalid { violations: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OutputError {
    pub fn to_failure(&self) -> Failure {
        Failure::new(FailureKind::OutputValidation, self.to_string())
    }
}
