//! Codec descriptors.

use serde::{Deserialize, Serialize};

use super::options::{OptionKind, OptionMap, OptionSchema};
use super::types::{preset_rank, AcceleratorFamily, CodecFamily, QualityTier, TrackKind};
use crate::validation::ValidationIssue;

/// How an encoder expresses constant-quality rate control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QualityControl {
    /// `-crf` (x264, x265, libvpx, SVT-AV1)
    Crf { min: u8, max: u8 },
    /// `-cq` (NVENC)
    Cq { min: u8, max: u8 },
    /// `-global_quality` (QSV)
    GlobalQuality { min: u8, max: u8 },
    /// `-qp` (AMF, VA-API)
    Qp { min: u8, max: u8 },
    /// Bitrate-only encoders.
    None,
}

impl QualityControl {
    fn flag(&self) -> Option<&'static str> {
        match self {
            Self::Crf { .. } => Some("-crf"),
            Self::Cq { .. } => Some("-cq"),
            Self::GlobalQuality { .. } => Some("-global_quality"),
            Self::Qp { .. } => Some("-qp"),
            Self::None => None,
        }
    }

    fn range(&self) -> Option<(u8, u8)> {
        match *self {
            Self::Crf { min, max }
            | Self::Cq { min, max }
            | Self::GlobalQuality { min, max }
            | Self::Qp { min, max } => Some((min, max)),
            Self::None => None,
        }
    }
}

/// Mutable per-job encoder settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bitrate_kbps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tune: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    /// Keyframe interval in frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

/// Static description of one encoder; instantiated by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CodecSpec {
    pub name: &'static str,
    pub encoder: &'static str,
    pub display_name: &'static str,
    pub family: CodecFamily,
    pub hardware: Option<AcceleratorFamily>,
    pub presets: &'static [&'static str],
    pub profiles: &'static [&'static str],
    pub tunes: &'static [&'static str],
    pub quality: QualityControl,
}

/// A codec instance: static identity plus owned, mutable settings.
///
/// Instances are values. Every job configures its own clone, so two jobs
/// never observe each other's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    spec: CodecSpec,
    settings: CodecSettings,
}

impl CodecDescriptor {
    pub(crate) fn from_spec(spec: CodecSpec) -> Self {
        Self {
            spec,
            settings: CodecSettings::default(),
        }
    }

    /// Canonical name (`h265`, or the encoder id for hardware codecs).
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// ffmpeg encoder id (`libx265`, `hevc_nvenc`).
    pub fn encoder(&self) -> &'static str {
        self.spec.encoder
    }

    pub fn display_name(&self) -> &'static str {
        self.spec.display_name
    }

    pub fn family(&self) -> CodecFamily {
        self.spec.family
    }

    pub fn track(&self) -> TrackKind {
        self.spec.family.track()
    }

    pub fn is_hardware(&self) -> bool {
        self.spec.hardware.is_some()
    }

    pub fn accelerator(&self) -> Option<AcceleratorFamily> {
        self.spec.hardware
    }

    pub fn presets(&self) -> &'static [&'static str] {
        self.spec.presets
    }

    pub fn profiles(&self) -> &'static [&'static str] {
        self.spec.profiles
    }

    pub fn quality_control(&self) -> QualityControl {
        self.spec.quality
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut CodecSettings {
        &mut self.settings
    }

    /// Replaces all settings.
    pub fn with_settings(mut self, settings: CodecSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Preset from this codec's catalog closest to `ideal` on the x264 speed
    /// scale. Ties prefer the slower preset. `None` if the codec has no presets.
    pub fn nearest_preset(&self, ideal: &str) -> Option<&'static str> {
        if let Some(exact) = self.spec.presets.iter().find(|p| **p == ideal) {
            return Some(*exact);
        }
        let target = preset_rank(ideal)? as i64;
        self.spec
            .presets
            .iter()
            .filter_map(|p| preset_rank(p).map(|r| (*p, r as i64)))
            .min_by_key(|(_, rank)| ((rank - target).abs(), -rank))
            .map(|(p, _)| p)
    }

    /// Applies a quality tier: preset (with nearest fallback) and CRF (clamped).
    pub fn apply_quality_tier(&mut self, tier: QualityTier) {
        let (preset, crf) = tier.ideal();
        self.settings.preset = self.nearest_preset(preset).map(str::to_string);
        self.settings.crf = self
            .spec
            .quality
            .range()
            .map(|(min, max)| crf.clamp(min, max));
    }

    /// RFC 6381 codec tag used in streaming manifests.
    pub fn codec_tag(&self) -> Option<String> {
        let tag = match self.spec.family {
            CodecFamily::H264 => match self.settings.profile.as_deref() {
                Some("baseline") => "avc1.42E01E",
                Some("main") => "avc1.4D401F",
                _ => "avc1.640028",
            },
            CodecFamily::H265 => match self.settings.profile.as_deref() {
                Some("main10") => "hvc1.2.4.L120.90",
                _ => "hvc1.1.6.L120.90",
            },
            CodecFamily::Vp9 => "vp09.00.40.08",
            CodecFamily::Av1 => "av01.0.08M.08",
            CodecFamily::Aac => "mp4a.40.2",
            CodecFamily::Mp3 => "mp4a.40.34",
            CodecFamily::Opus => "Opus",
            CodecFamily::Ac3 => "ac-3",
            CodecFamily::Eac3 => "ec-3",
            CodecFamily::Flac => "fLaC",
            CodecFamily::WebVtt => "wvtt",
            CodecFamily::MovText => "tx3g",
            CodecFamily::Srt | CodecFamily::Ass => return None,
        };
        Some(tag.to_string())
    }

    /// Ordered encoder arguments for this codec's settings.
    pub fn args(&self) -> OptionMap {
        let s = &self.settings;
        let spec = self.track().specifier();
        let mut args = OptionMap::new();
        args.insert(&format!("-c:{}", spec), self.spec.encoder);

        match self.track() {
            TrackKind::Video => {
                if let Some(ref preset) = s.preset {
                    args.insert("-preset", preset.as_str());
                }
                if let (Some(crf), Some(flag)) = (s.crf, self.spec.quality.flag()) {
                    args.insert(flag, crf.to_string());
                }
                if let Some(bitrate) = s.bitrate_kbps {
                    args.insert("-b:v", format!("{}k", bitrate));
                }
                if let Some(max) = s.max_bitrate_kbps {
                    args.insert("-maxrate", format!("{}k", max));
                    args.insert("-bufsize", format!("{}k", max * 2));
                }
                if let Some(ref profile) = s.profile {
                    args.insert("-profile:v", profile.as_str());
                }
                if let Some(ref tune) = s.tune {
                    if !self.spec.tunes.is_empty() {
                        args.insert("-tune", tune.as_str());
                    }
                }
                if let Some(ref pix_fmt) = s.pixel_format {
                    args.insert("-pix_fmt", pix_fmt.as_str());
                }
                if let Some(gop) = s.keyframe_interval {
                    args.insert("-g", gop.to_string());
                    args.insert("-keyint_min", gop.to_string());
                }
            }
            TrackKind::Audio => {
                if let Some(bitrate) = s.bitrate_kbps {
                    args.insert("-b:a", format!("{}k", bitrate));
                }
                if let Some(ref profile) = s.profile {
                    args.insert("-profile:a", profile.as_str());
                }
                if let Some(rate) = s.sample_rate_hz {
                    args.insert("-ar", rate.to_string());
                }
                if let Some(channels) = s.channels {
                    args.insert("-ac", channels.to_string());
                }
            }
            TrackKind::Subtitle => {}
        }

        args
    }

    /// Checks the settings against this codec's catalog. `field` prefixes
    /// every reported path (e.g. `video`).
    pub fn validate(&self, field: &str) -> Vec<ValidationIssue> {
        let s = &self.settings;
        let mut issues = Vec::new();

        if let Some(ref preset) = s.preset {
            if self.spec.presets.is_empty() {
                issues.push(ValidationIssue::warning(
                    format!("{}.preset", field),
                    format!("{} has no presets; '{}' is ignored", self.spec.encoder, preset),
                ));
            } else if !self.spec.presets.contains(&preset.as_str()) {
                issues.push(ValidationIssue::error(
                    format!("{}.preset", field),
                    format!(
                        "preset '{}' is not supported by {} (expected one of: {})",
                        preset,
                        self.spec.encoder,
                        self.spec.presets.join(", ")
                    ),
                ));
            }
        }

        if let Some(crf) = s.crf {
            match self.spec.quality.range() {
                Some((min, max)) if crf < min || crf > max => {
                    issues.push(ValidationIssue::error(
                        format!("{}.crf", field),
                        format!("crf {} is outside {}..={} for {}", crf, min, max, self.spec.encoder),
                    ));
                }
                None => issues.push(ValidationIssue::warning(
                    format!("{}.crf", field),
                    format!("{} does not support constant quality; crf is ignored", self.spec.encoder),
                )),
                _ => {}
            }
        }

        if s.bitrate_kbps == Some(0) {
            issues.push(ValidationIssue::error(
                format!("{}.bitrate", field),
                "bitrate must be greater than zero",
            ));
        }

        if let (Some(bitrate), Some(max)) = (s.bitrate_kbps, s.max_bitrate_kbps) {
            if max < bitrate {
                issues.push(ValidationIssue::error(
                    format!("{}.max_bitrate", field),
                    format!("max bitrate {}k is below target bitrate {}k", max, bitrate),
                ));
            }
        }

        if let Some(ref profile) = s.profile {
            if !self.spec.profiles.is_empty() && !self.spec.profiles.contains(&profile.as_str()) {
                issues.push(ValidationIssue::error(
                    format!("{}.profile", field),
                    format!(
                        "profile '{}' is not supported by {} (expected one of: {})",
                        profile,
                        self.spec.encoder,
                        self.spec.profiles.join(", ")
                    ),
                ));
            }
        }

        if let Some(ref tune) = s.tune {
            if self.spec.tunes.is_empty() {
                issues.push(ValidationIssue::warning(
                    format!("{}.tune", field),
                    format!("{} has no tune option; '{}' is ignored", self.spec.encoder, tune),
                ));
            } else if !self.spec.tunes.contains(&tune.as_str()) {
                issues.push(ValidationIssue::error(
                    format!("{}.tune", field),
                    format!("tune '{}' is not supported by {}", tune, self.spec.encoder),
                ));
            }
        }

        if s.keyframe_interval == Some(0) {
            issues.push(ValidationIssue::error(
                format!("{}.keyframe_interval", field),
                "keyframe interval must be greater than zero",
            ));
        }

        if s.channels == Some(0) {
            issues.push(ValidationIssue::error(
                format!("{}.channels", field),
                "channel count must be greater than zero",
            ));
        }

        issues
    }

    /// Option schema for capability discovery.
    pub fn option_schema(&self) -> Vec<OptionSchema> {
        let mut schema = Vec::new();
        match self.track() {
            TrackKind::Video => {
                if !self.spec.presets.is_empty() {
                    schema.push(OptionSchema::choice("preset", self.spec.presets, "Encoder speed/efficiency preset"));
                }
                if let Some((min, max)) = self.spec.quality.range() {
                    let name = self.spec.quality.flag().unwrap_or("-crf").trim_start_matches('-');
                    schema.push(OptionSchema::integer(name, min as f64, max as f64, "Constant quality level (lower is better)"));
                }
                schema.push(OptionSchema::integer("bitrate", 100.0, 200_000.0, "Target bitrate in kbps"));
                if !self.spec.profiles.is_empty() {
                    schema.push(OptionSchema::choice("profile", self.spec.profiles, "Codec profile"));
                }
                if !self.spec.tunes.is_empty() {
                    schema.push(OptionSchema::choice("tune", self.spec.tunes, "Content tuning"));
                }
                schema.push(OptionSchema::new("pix_fmt", OptionKind::String, "Output pixel format"));
                schema.push(OptionSchema::integer("g", 1.0, 1000.0, "Keyframe interval in frames"));
            }
            TrackKind::Audio => {
                schema.push(OptionSchema::integer("bitrate", 32.0, 1536.0, "Target bitrate in kbps").with_default(128));
                schema.push(OptionSchema::choice("ar", &["22050", "44100", "48000", "96000"], "Sample rate in Hz"));
                schema.push(OptionSchema::integer("ac", 1.0, 8.0, "Channel count").with_default(2));
            }
            TrackKind::Subtitle => {}
        }
        schema
    }
}
