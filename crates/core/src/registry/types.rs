//! Node registration, heartbeat and snapshot types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a node sends when it registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub max_concurrent_jobs: u32,
    /// Encoder ids the node can run. Empty accepts any.
    #[serde(default)]
    pub encoders: Vec<String>,
}

impl NodeRegistration {
    pub fn new(id: impl Into<String>, max_concurrent_jobs: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: String::new(),
            address: "127.0.0.1".to_string(),
            port: 0,
            tls: false,
            max_concurrent_jobs,
            encoders: Vec::new(),
        }
    }

    pub fn with_encoders<I, S>(mut self, encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoders = encoders.into_iter().map(Into::into).collect();
        self
    }
}

/// Health report carried by a heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHealth {
    /// When the node produced the report.
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub cpu_percent: f32,
    #[serde(default)]
    pub memory_used_mb: u64,
    #[serde(default)]
    pub memory_available_mb: u64,
    /// Jobs the node believes it runs. Informational only.
    #[serde(default)]
    pub active_jobs: u32,
    #[serde(default)]
    pub completed_jobs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_percent: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
}

impl NodeHealth {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            cpu_percent: 0.0,
            memory_used_mb: 0,
            memory_available_mb: 0,
            active_jobs: 0,
            completed_jobs: 0,
            gpu_percent: None,
            temperature_c: None,
        }
    }
}

/// Point-in-time view of a registered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderNode {
    pub id: String,
    pub name: String,
    pub version: String,
    pub address: String,
    pub port: u16,
    pub tls: bool,
    pub max_concurrent_jobs: u32,
    pub encoders: Vec<String>,
    /// Tasks this process currently runs on the node.
    pub current_jobs: u32,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<NodeHealth>,
}

impl EncoderNode {
    pub fn available_capacity(&self) -> u32 {
        self.max_concurrent_jobs.saturating_sub(self.current_jobs)
    }

    /// Whether the node can run `encoder`.
    pub fn accepts(&self, encoder: &str) -> bool {
        self.encoders.is_empty() || self.encoders.iter().any(|e| e == encoder)
    }

    /// `http(s)://address:port`
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.address, self.port)
    }
}
