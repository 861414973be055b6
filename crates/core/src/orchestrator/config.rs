//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for job intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Profile used when a request names none.
    #[serde(default = "default_profile")]
    pub default_profile: String,

    /// Base directory for relative output directories.
    /// When unset, relative paths resolve against the working directory.
    #[serde(default)]
    pub output_root: Option<PathBuf>,
}

fn default_profile() -> String {
    "default".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            output_root: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn resolve_output_dir(&self, dir: &Path) -> PathBuf {
        match &self.output_root {
            Some(root) if dir.is_relative() => root.join(dir),
            _ => dir.to_path_buf(),
        }
    }
}
