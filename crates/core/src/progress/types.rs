use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Progress emission settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Minimum milliseconds between two progress events of one task.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// One rate-limited progress observation for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// 0.0 - 100.0
    pub percent: f64,
    /// Media time encoded so far, in seconds.
    pub out_time_secs: f64,
    /// Wall-clock time since the monitor started.
    pub elapsed_secs: f64,
    /// Estimated wall-clock time remaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    /// Encode speed relative to real time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Task-count-weighted mean of task percentages. Zero tasks is 0%.
pub fn aggregate_percent(percents: &[f64]) -> f64 {
    if percents.is_empty() {
        return 0.0;
    }
    percents.iter().map(|p| p.clamp(0.0, 100.0)).sum::<f64>() / percents.len() as f64
}
