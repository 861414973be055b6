//! Transcode orchestrator: job intake and background loops.
//!
//! A submitted [`JobRequest`] goes through profile lookup, resolution
//! against the hardware inventory, input probing and task splitting before
//! the dispatcher takes over. The orchestrator also runs the registry's
//! stale-node sweep.

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::TranscodeOrchestrator;
pub use types::{JobRequest, OrchestratorError, OrchestratorStatus};
