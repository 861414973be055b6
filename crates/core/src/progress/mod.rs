//! Progress monitoring.
//!
//! The encoder writes `key=value` blocks to stderr (`-progress pipe:2`).
//! [`ProgressMonitor`] parses them and emits [`ProgressUpdate`]s at most
//! once per configured interval; job progress is the mean over tasks.

mod monitor;
mod parser;
mod types;

pub use monitor::ProgressMonitor;
pub use parser::{LineKind, ProgressSample};
pub use types::{aggregate_percent, ProgressConfig, ProgressUpdate};
