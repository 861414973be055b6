//! Types for the transcode orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::job::JobId;

/// Errors that can occur during job intake.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Profile lookup or resolution failed.
    #[error(transparent)]
    Profile(#[from] crate::profile::ProfileError),

    /// The input could not be probed.
    #[error(transparent)]
    Probe(#[from] crate::probe::ProbeError),

    #[error(transparent)]
    Split(#[from] crate::splitter::SplitError),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// The job already reached a terminal status.
    #[error("Job already finished: {0}")]
    JobFinished(JobId),
}

impl OrchestratorError {
    /// Machine-readable category; every intake failure is a configuration
    /// problem from the submitter's point of view.
    pub fn kind(&self) -> crate::job::FailureKind {
        crate::job::FailureKind::Configuration
    }
}

/// A request to encode one input with one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Profile name; the configured default when absent.
    #[serde(default)]
    pub profile: Option<String>,
    /// Specific profile version; the latest when absent.
    #[serde(default)]
    pub profile_version: Option<u32>,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            profile: None,
            profile_version: None,
        }
    }

    pub fn with_profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the background loops are running.
    pub running: bool,
    pub nodes_active: usize,
    pub nodes_inactive: usize,
    /// Known jobs by status.
    pub jobs: BTreeMap<String, usize>,
}
