use serde::{Deserialize, Serialize};

/// Segmented output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Target segment duration in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: f64,

    /// Allowed deviation of a segment from the target duration.
    #[serde(default = "default_tolerance")]
    pub duration_tolerance_secs: f64,

    /// File name of the master playlist inside the job's output directory.
    #[serde(default = "default_master_playlist_name")]
    pub master_playlist_name: String,
}

fn default_segment_duration() -> f64 {
    6.0
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_master_playlist_name() -> String {
    "master.m3u8".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: default_segment_duration(),
            duration_tolerance_secs: default_tolerance(),
            master_playlist_name: default_master_playlist_name(),
        }
    }
}
