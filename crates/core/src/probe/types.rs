//! Probed input description.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Absolute stream index in the input.
    pub index: u32,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub framerate: Option<f64>,
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub pixel_format: Option<String>,
    /// PQ or HLG transfer characteristics.
    #[serde(default)]
    pub hdr: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    pub index: u32,
    pub codec: String,
    #[serde(default)]
    pub channels: Option<u8>,
    #[serde(default)]
    pub sample_rate_hz: Option<u32>,
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub index: u32,
    pub codec: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Text subtitles can be converted; bitmap ones (PGS, VobSub) cannot.
    pub text_based: bool,
}

/// Streams found in an input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbedInput {
    pub path: PathBuf,
    pub format: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub video_streams: Vec<VideoStream>,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
    #[serde(default)]
    pub subtitle_streams: Vec<SubtitleStream>,
}

impl ProbedInput {
    /// First video stream, which renditions are derived from.
    pub fn primary_video(&self) -> Option<&VideoStream> {
        self.video_streams.first()
    }

    pub fn is_hdr(&self) -> bool {
        self.primary_video().is_some_and(|v| v.hdr)
    }
}

const TEXT_SUBTITLE_CODECS: &[&str] = &["subrip", "srt", "ass", "ssa", "webvtt", "mov_text", "text"];

pub(crate) fn is_text_subtitle(codec: &str) -> bool {
    TEXT_SUBTITLE_CODECS.contains(&codec)
}
