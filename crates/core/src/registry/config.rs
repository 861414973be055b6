use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Node liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Interval at which nodes are expected to report.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Silence after which a node is marked inactive. Defaults to three
    /// heartbeat intervals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_threshold_secs: Option<u64>,

    /// How often the stale sweep runs. Defaults to the heartbeat interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            stale_threshold_secs: None,
            sweep_interval_secs: None,
        }
    }
}

impl RegistryConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(
            self.stale_threshold_secs
                .unwrap_or(self.heartbeat_interval_secs.saturating_mul(3)),
        )
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.unwrap_or(self.heartbeat_interval_secs))
    }
}
