//! Vocabulary shared by codec and container descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of elementary stream a codec or task handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

impl TrackKind {
    /// ffmpeg stream specifier letter (`v`, `a`, `s`).
    pub fn specifier(&self) -> &'static str {
        match self {
            Self::Video => "v",
            Self::Audio => "a",
            Self::Subtitle => "s",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codec family, independent of the concrete (software or hardware) encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecFamily {
    H264,
    H265,
    Vp9,
    Av1,
    Aac,
    Opus,
    Mp3,
    Ac3,
    Eac3,
    Flac,
    WebVtt,
    Srt,
    MovText,
    Ass,
}

impl CodecFamily {
    /// Canonical name, as listed in container support tables.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Mp3 => "mp3",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Flac => "flac",
            Self::WebVtt => "webvtt",
            Self::Srt => "srt",
            Self::MovText => "mov_text",
            Self::Ass => "ass",
        }
    }

    pub fn track(&self) -> TrackKind {
        match self {
            Self::H264 | Self::H265 | Self::Vp9 | Self::Av1 => TrackKind::Video,
            Self::Aac | Self::Opus | Self::Mp3 | Self::Ac3 | Self::Eac3 | Self::Flac => {
                TrackKind::Audio
            }
            Self::WebVtt | Self::Srt | Self::MovText | Self::Ass => TrackKind::Subtitle,
        }
    }

    /// Families that have hardware encoder variants.
    pub fn is_hardware_capable(&self) -> bool {
        matches!(self, Self::H264 | Self::H265 | Self::Vp9 | Self::Av1)
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Vendor-specific GPU encode API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorFamily {
    /// NVIDIA NVENC
    Nvenc,
    /// Intel Quick Sync
    Qsv,
    /// AMD AMF
    Amf,
    /// Apple VideoToolbox
    VideoToolbox,
    /// Generic VA-API (Linux)
    Vaapi,
}

impl AcceleratorFamily {
    /// Encoder name suffix used by ffmpeg (`h264_<suffix>`).
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Nvenc => "nvenc",
            Self::Qsv => "qsv",
            Self::Amf => "amf",
            Self::VideoToolbox => "videotoolbox",
            Self::Vaapi => "vaapi",
        }
    }
}

impl fmt::Display for AcceleratorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// x264-style preset speed scale, fastest first.
pub const PRESET_SCALE: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Position of a preset on [`PRESET_SCALE`].
pub fn preset_rank(preset: &str) -> Option<usize> {
    PRESET_SCALE.iter().position(|p| *p == preset)
}

/// Quality tier a profile may request instead of explicit preset/CRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Ultrafast,
    Fast,
    Balanced,
    Quality,
    HighQuality,
}

impl QualityTier {
    /// Ideal `(preset, crf)` for this tier.
    pub fn ideal(&self) -> (&'static str, u8) {
        match self {
            Self::Ultrafast => ("ultrafast", 28),
            Self::Fast => ("fast", 25),
            Self::Balanced => ("medium", 23),
            Self::Quality => ("slow", 20),
            Self::HighQuality => ("veryslow", 18),
        }
    }
}
