//! Task execution: dispatch, retry, and the process runner.
//!
//! The [`Dispatcher`] owns job lifecycles. It reserves node capacity through
//! the registry, builds each task's command line, and hands the attempt to a
//! [`TaskRunner`]. Failures are classified by [`ExecutionError::kind`]; only
//! transient ones are retried, with capped exponential backoff.

mod config;
mod dispatcher;
mod error;
mod retry;
mod runner;
mod types;

pub use config::{DispatcherConfig, RetryConfig};
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use error::{is_fatal_output, ExecutionError};
pub use retry::RetryPolicy;
pub use runner::{ProcessRunner, TaskRunner};
pub use types::{JobEvent, TaskContext};
