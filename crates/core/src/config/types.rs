use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::executor::DispatcherConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::output::OutputConfig;
use crate::progress::ProgressConfig;
use crate::registry::RegistryConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub local_node: LocalNodeConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// External encoder binaries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfmpegConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "warning".to_string()
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl FfmpegConfig {
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Global options placed before any input.
    pub fn global_args(&self) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-nostats".to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Hardware detection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// DRM render node for VA-API and QSV.
    #[serde(default)]
    pub vaapi_device: Option<String>,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_probe_timeout() -> u64 {
    10
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vaapi_device: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// Registration of the host process itself as an encoder node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalNodeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_node_id")]
    pub id: String,

    #[serde(default = "default_node_name")]
    pub name: String,

    #[serde(default = "default_max_jobs")]
    pub max_concurrent_jobs: u32,

    /// Codec ids the node accepts. Empty accepts any codec.
    #[serde(default)]
    pub encoders: Vec<String>,
}

fn default_node_id() -> String {
    "local".to_string()
}

fn default_node_name() -> String {
    "Local encoder".to_string()
}

fn default_max_jobs() -> u32 {
    2
}

impl Default for LocalNodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id: default_node_id(),
            name: default_node_name(),
            max_concurrent_jobs: default_max_jobs(),
            encoders: Vec::new(),
        }
    }
}
