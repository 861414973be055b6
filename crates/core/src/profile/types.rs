//! Encoding profile types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{OptionMap, QualityTier};

/// One rung of a video bitrate ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub name: String,
    pub height: u32,
    pub bitrate_kbps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate_kbps: Option<u32>,
}

impl Rendition {
    pub fn new(name: impl Into<String>, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            name: name.into(),
            height,
            bitrate_kbps,
            max_bitrate_kbps: None,
        }
    }
}

/// Video track configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_codec")]
    pub codec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_video_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate_kbps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framerate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    #[serde(default = "default_preset", skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Overrides `preset` and `crf` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tune: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u32>,
    #[serde(default)]
    pub hdr_to_sdr: bool,
    #[serde(default = "default_true")]
    pub hardware_acceleration: bool,
    /// Empty means a single rendition from `height` and `bitrate_kbps`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renditions: Vec<Rendition>,
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub custom_options: OptionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_args: Option<String>,
}

fn default_video_codec() -> String {
    "h264".to_string()
}

fn default_height() -> u32 {
    1080
}

fn default_video_bitrate() -> u32 {
    5000
}

fn default_preset() -> Option<String> {
    Some("medium".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            width: None,
            height: default_height(),
            bitrate_kbps: default_video_bitrate(),
            max_bitrate_kbps: None,
            framerate: None,
            crf: None,
            preset: default_preset(),
            quality: None,
            profile: None,
            tune: None,
            pixel_format: None,
            keyframe_interval: None,
            hdr_to_sdr: false,
            hardware_acceleration: true,
            renditions: Vec::new(),
            custom_options: OptionMap::new(),
            custom_args: None,
        }
    }
}

impl VideoConfig {
    /// The configured ladder, or one rendition from the top-level settings.
    pub fn effective_renditions(&self) -> Vec<Rendition> {
        if !self.renditions.is_empty() {
            return self.renditions.clone();
        }
        vec![Rendition {
            name: format!("{}p", self.height),
            height: self.height,
            bitrate_kbps: self.bitrate_kbps,
            max_bitrate_kbps: self.max_bitrate_kbps,
        }]
    }
}

/// Audio track configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_audio_codec")]
    pub codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub bitrate_kbps: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub custom_options: OptionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_args: Option<String>,
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> u32 {
    128
}

fn default_channels() -> u8 {
    2
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: default_audio_codec(),
            bitrate_kbps: default_audio_bitrate(),
            channels: default_channels(),
            sample_rate_hz: None,
            profile: None,
            custom_options: OptionMap::new(),
            custom_args: None,
        }
    }
}

/// Subtitle track configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleConfig {
    #[serde(default = "default_subtitle_codec")]
    pub codec: String,
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub custom_options: OptionMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_args: Option<String>,
}

fn default_subtitle_codec() -> String {
    "webvtt".to_string()
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            codec: default_subtitle_codec(),
            custom_options: OptionMap::new(),
            custom_args: None,
        }
    }
}

/// What a profile's output is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilePurpose {
    #[default]
    Streaming,
    Download,
    Archive,
}

/// A named, versioned encoding profile.
///
/// Profiles referenced by a job are shared as `Arc` snapshots and never
/// mutated; saving an edit creates a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingProfile {
    pub name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default)]
    pub purpose: ProfilePurpose,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<SubtitleConfig>,
    /// Applied last; may replace any earlier option in place.
    #[serde(default, skip_serializing_if = "OptionMap::is_empty")]
    pub overrides: OptionMap,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_container() -> String {
    "hls".to_string()
}

impl EncodingProfile {
    /// A profile with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            container: default_container(),
            purpose: ProfilePurpose::default(),
            video: VideoConfig::default(),
            audio: AudioConfig::default(),
            subtitle: None,
            overrides: OptionMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_video(mut self, video: VideoConfig) -> Self {
        self.video = video;
        self
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_subtitle(mut self, subtitle: SubtitleConfig) -> Self {
        self.subtitle = Some(subtitle);
        self
    }
}

/// Profile as submitted by a client: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub name: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub purpose: Option<ProfilePurpose>,
    #[serde(default)]
    pub video: Option<VideoConfig>,
    #[serde(default)]
    pub audio: Option<AudioConfig>,
    #[serde(default)]
    pub subtitle: Option<SubtitleConfig>,
    #[serde(default)]
    pub overrides: Option<OptionMap>,
}

impl From<ProfileRequest> for EncodingProfile {
    fn from(req: ProfileRequest) -> Self {
        let defaults = EncodingProfile::new(req.name);
        Self {
            container: req.container.unwrap_or(defaults.container.clone()),
            purpose: req.purpose.unwrap_or_default(),
            video: req.video.unwrap_or_default(),
            audio: req.audio.unwrap_or_default(),
            subtitle: req.subtitle,
            overrides: req.overrides.unwrap_or_default(),
            ..defaults
        }
    }
}
