//! Profile + hardware inventory -> validated encode plan.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::error::ProfileError;
use super::types::{AudioConfig, EncodingProfile, Rendition, SubtitleConfig, VideoConfig};
use super::validation::{check_codec, extra_options, validate_profile};
use crate::capability::{
    lookup_container, CodecDescriptor, ContainerDescriptor, OptionMap, TrackKind,
};
use crate::hardware::{GpuAccelerator, HardwareAcceleratorService};
use crate::validation::{ValidationIssue, ValidationReport};

/// Resolved video settings shared by every rendition.
#[derive(Debug, Clone)]
pub struct VideoPlan {
    /// Configured codec; renditions clone it and set their own bitrate.
    pub codec: CodecDescriptor,
    pub renditions: Vec<Rendition>,
    pub width: Option<u32>,
    pub framerate: Option<f64>,
    pub hdr_to_sdr: bool,
    /// Accelerator backing a hardware codec.
    pub accelerator: Option<GpuAccelerator>,
    /// Device initialisation options placed before `-i`.
    pub pre_input: OptionMap,
    pub extra_options: OptionMap,
}

#[derive(Debug, Clone)]
pub struct AudioPlan {
    pub codec: CodecDescriptor,
    pub extra_options: OptionMap,
}

#[derive(Debug, Clone)]
pub struct SubtitlePlan {
    pub codec: CodecDescriptor,
    pub extra_options: OptionMap,
}

/// A profile made concrete against the installed hardware.
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub profile: Arc<EncodingProfile>,
    pub container: ContainerDescriptor,
    pub video: VideoPlan,
    pub audio: AudioPlan,
    pub subtitle: Option<SubtitlePlan>,
    pub overrides: OptionMap,
    /// Non-fatal findings (ignored settings, fallbacks).
    pub warnings: Vec<ValidationIssue>,
}

/// Short description of a plan, for logs and API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub profile: String,
    pub version: u32,
    pub container: String,
    pub video_encoder: String,
    pub hardware: bool,
    pub audio_encoder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_encoder: Option<String>,
    pub renditions: Vec<String>,
}

impl EncodePlan {
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            profile: self.profile.name.clone(),
            version: self.profile.version,
            container: self.container.name().to_string(),
            video_encoder: self.video.codec.encoder().to_string(),
            hardware: self.video.codec.is_hardware(),
            audio_encoder: self.audio.codec.encoder().to_string(),
            subtitle_encoder: self.subtitle.as_ref().map(|s| s.codec.encoder().to_string()),
            renditions: self.video.renditions.iter().map(|r| r.name.clone()).collect(),
        }
    }
}

/// Turns profiles into encode plans.
///
/// Every codec id goes through [`HardwareAcceleratorService::recommended_codec`],
/// so a hardware encoder appears in a plan only when its accelerator exists.
pub struct ProfileResolver {
    hardware: Arc<HardwareAcceleratorService>,
}

impl ProfileResolver {
    pub fn new(hardware: Arc<HardwareAcceleratorService>) -> Self {
        Self { hardware }
    }

    /// Resolves a profile, or fails with every violation found.
    pub async fn resolve(&self, profile: Arc<EncodingProfile>) -> Result<EncodePlan, ProfileError> {
        let container = lookup_container(&profile.container);
        let mut issues = validate_profile(&profile, container.as_ref());

        let video = self.resolve_video(&profile.video, container.as_ref(), &mut issues).await;
        let audio = self.resolve_audio(&profile.audio, container.as_ref(), &mut issues).await;
        let subtitle = match profile.subtitle {
            Some(ref cfg) => self.resolve_subtitle(cfg, container.as_ref(), &mut issues).await,
            None => None,
        };

        let report = ValidationReport::from_issues(issues);
        let (Some(container), Some(video), Some(audio), true) = (container, video, audio, report.valid)
        else {
            return Err(ProfileError::Validation(report));
        };
        if profile.subtitle.is_some() && subtitle.is_none() {
            return Err(ProfileError::Validation(report));
        }

        debug!(
            profile = %profile.name,
            container = container.name(),
            video = video.codec.encoder(),
            audio = audio.codec.encoder(),
            "Profile resolved"
        );

        Ok(EncodePlan {
            overrides: profile.overrides.clone(),
            profile,
            container,
            video,
            audio,
            subtitle,
            warnings: report.issues,
        })
    }

    /// Full validation report for a profile, warnings included.
    pub async fn validate(&self, profile: &EncodingProfile) -> ValidationReport {
        match self.resolve(Arc::new(profile.clone())).await {
            Ok(plan) => ValidationReport::from_issues(plan.warnings),
            Err(ProfileError::Validation(report)) => report,
            Err(e) => ValidationReport::from_issues(vec![ValidationIssue::error("profile", e.to_string())]),
        }
    }

    async fn resolve_video(
        &self,
        cfg: &VideoConfig,
        container: Option<&ContainerDescriptor>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<VideoPlan> {
        let extra = extra_options("video", &cfg.custom_options, cfg.custom_args.as_deref(), issues);

        if let Err(issue) = check_codec("video.codec", &cfg.codec, TrackKind::Video, container) {
            issues.push(issue);
            return None;
        }
        let mut codec = match self
            .hardware
            .recommended_codec(&cfg.codec, cfg.hardware_acceleration)
            .await
        {
            Ok(codec) => codec,
            Err(e) => {
                issues.push(ValidationIssue::error("video.codec", e.to_string()));
                return None;
            }
        };

        {
            let s = codec.settings_mut();
            s.bitrate_kbps = Some(cfg.bitrate_kbps);
            s.max_bitrate_kbps = cfg.max_bitrate_kbps;
            s.profile = cfg.profile.clone();
            s.tune = cfg.tune.clone();
            s.pixel_format = cfg.pixel_format.clone();
            s.keyframe_interval = cfg.keyframe_interval;
        }

        match cfg.quality {
            Some(tier) => codec.apply_quality_tier(tier),
            None => {
                let preset = cfg
                    .preset
                    .as_deref()
                    .and_then(|p| select_preset(&codec, p, issues));
                let s = codec.settings_mut();
                s.crf = cfg.crf;
                s.preset = preset;
            }
        }
        issues.extend(codec.validate("video"));

        let accelerator = self.hardware.accelerator_for(&codec).await;
        let pre_input = accelerator
            .as_ref()
            .map(GpuAccelerator::device_init_options)
            .unwrap_or_default();

        Some(VideoPlan {
            codec,
            renditions: cfg.effective_renditions(),
            width: cfg.width,
            framerate: cfg.framerate,
            hdr_to_sdr: cfg.hdr_to_sdr,
            accelerator,
            pre_input,
            extra_options: extra,
        })
    }

    async fn resolve_audio(
        &self,
        cfg: &AudioConfig,
        container: Option<&ContainerDescriptor>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<AudioPlan> {
        let extra = extra_options("audio", &cfg.custom_options, cfg.custom_args.as_deref(), issues);

        if let Err(issue) = check_codec("audio.codec", &cfg.codec, TrackKind::Audio, container) {
            issues.push(issue);
            return None;
        }
        let mut codec = match self.hardware.recommended_codec(&cfg.codec, false).await {
            Ok(codec) => codec,
            Err(e) => {
                issues.push(ValidationIssue::error("audio.codec", e.to_string()));
                return None;
            }
        };

        {
            let s = codec.settings_mut();
            s.bitrate_kbps = Some(cfg.bitrate_kbps);
            s.channels = Some(cfg.channels);
            s.sample_rate_hz = cfg.sample_rate_hz;
            s.profile = cfg.profile.clone();
        }
        issues.extend(codec.validate("audio"));

        Some(AudioPlan {
            codec,
            extra_options: extra,
        })
    }

    async fn resolve_subtitle(
        &self,
        cfg: &SubtitleConfig,
        container: Option<&ContainerDescriptor>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<SubtitlePlan> {
        let extra = extra_options("subtitle", &cfg.custom_options, cfg.custom_args.as_deref(), issues);

        if let Err(issue) = check_codec("subtitle.codec", &cfg.codec, TrackKind::Subtitle, container) {
            issues.push(issue);
            return None;
        }
        match self.hardware.recommended_codec(&cfg.codec, false).await {
            Ok(codec) => Some(SubtitlePlan {
                codec,
                extra_options: extra,
            }),
            Err(e) => {
                issues.push(ValidationIssue::error("subtitle.codec", e.to_string()));
                None
            }
        }
    }
}

/// Maps a requested preset onto the codec's catalog.
fn select_preset(codec: &CodecDescriptor, requested: &str, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    if codec.presets().is_empty() {
        issues.push(ValidationIssue::info(
            "video.preset",
            format!("{} has no presets; '{}' is ignored", codec.encoder(), requested),
        ));
        return None;
    }
    match codec.nearest_preset(requested) {
        Some(preset) if preset != requested => {
            issues.push(ValidationIssue::info(
                "video.preset",
                format!("{} has no '{}' preset; using '{}'", codec.encoder(), requested, preset),
            ));
            Some(preset.to_string())
        }
        Some(preset) => Some(preset.to_string()),
        // Not on the speed scale: keep it so validation reports it.
        None => Some(requested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::QualityTier;
    use crate::hardware::GpuVendor;
    use crate::testing::StaticAcceleratorProbe;
    use crate::validation::Severity;

    fn resolver(gpus: Vec<GpuAccelerator>) -> ProfileResolver {
        let probe = Arc::new(StaticAcceleratorProbe::new(gpus));
        ProfileResolver::new(Arc::new(HardwareAcceleratorService::new(probe)))
    }

    #[tokio::test]
    async fn test_software_plan() {
        let plan = resolver(Vec::new())
            .resolve(Arc::new(EncodingProfile::new("web")))
            .await
            .unwrap();
        assert_eq!(plan.container.name(), "hls");
        assert_eq!(plan.video.codec.encoder(), "libx264");
        assert_eq!(plan.video.codec.settings().preset.as_deref(), Some("medium"));
        assert_eq!(plan.video.codec.settings().bitrate_kbps, Some(5000));
        assert!(plan.video.accelerator.is_none());
        assert!(plan.video.pre_input.is_empty());
        assert_eq!(plan.audio.codec.encoder(), "aac");
        assert_eq!(plan.audio.codec.settings().channels, Some(2));
        assert!(plan.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_hardware_plan_carries_device_init() {
        let plan = resolver(vec![GpuAccelerator::new(GpuVendor::Nvidia, "nvenc")])
            .resolve(Arc::new(EncodingProfile::new("web")))
            .await
            .unwrap();
        assert_eq!(plan.video.codec.encoder(), "h264_nvenc");
        assert_eq!(plan.video.pre_input.get_str("-hwaccel"), Some("cuda"));
        assert_eq!(plan.summary().video_encoder, "h264_nvenc");
        assert!(plan.summary().hardware);
    }

    #[tokio::test]
    async fn test_hardware_disabled_by_profile() {
        let mut profile = EncodingProfile::new("sw");
        profile.video.hardware_acceleration = false;
        let plan = resolver(vec![GpuAccelerator::new(GpuVendor::Nvidia, "nvenc")])
            .resolve(Arc::new(profile))
            .await
            .unwrap();
        assert_eq!(plan.video.codec.encoder(), "libx264");
    }

    #[tokio::test]
    async fn test_preset_falls_back_on_reduced_catalog() {
        let mut profile = EncodingProfile::new("hw");
        profile.video.preset = Some("veryslow".to_string());
        let plan = resolver(vec![GpuAccelerator::new(GpuVendor::Nvidia, "nvenc")])
            .resolve(Arc::new(profile))
            .await
            .unwrap();
        assert_eq!(plan.video.codec.settings().preset.as_deref(), Some("slow"));
        assert!(plan.warnings.iter().any(|w| w.field == "video.preset" && w.severity == Severity::Info));
    }

    #[tokio::test]
    async fn test_quality_tier() {
        let mut profile = EncodingProfile::new("q");
        profile.video.quality = Some(QualityTier::Quality);
        let plan = resolver(Vec::new()).resolve(Arc::new(profile)).await.unwrap();
        let settings = plan.video.codec.settings();
        assert_eq!(settings.preset.as_deref(), Some("slow"));
        assert_eq!(settings.crf, Some(20));
    }

    #[tokio::test]
    async fn test_reports_all_violations() {
        let mut profile = EncodingProfile::new("bad").with_container("webm");
        profile.video.codec = "h264".to_string();
        profile.audio.codec = "aac".to_string();
        profile.video.height = 0;
        let err = resolver(Vec::new()).resolve(Arc::new(profile)).await.unwrap_err();
        let report = err.report().unwrap();
        assert!(!report.valid);
        assert_eq!(report.for_field("video.codec").count(), 1);
        assert_eq!(report.for_field("audio.codec").count(), 1);
        assert_eq!(report.for_field("video.height").count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_codec_and_container() {
        let mut profile = EncodingProfile::new("bad").with_container("flv9");
        profile.video.codec = "realvideo".to_string();
        let report = resolver(Vec::new()).validate(&profile).await;
        assert!(!report.valid);
        assert_eq!(report.for_field("container").count(), 1);
        assert_eq!(report.for_field("video.codec").count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_settings_on_resolved_codec() {
        let mut profile = EncodingProfile::new("bad").with_container("mkv");
        profile.video.codec = "vp9".to_string();
        profile.video.preset = None;
        profile.video.crf = Some(70);
        let report = resolver(Vec::new()).validate(&profile).await;
        let crf: Vec<&ValidationIssue> = report.for_field("video.crf").collect();
        assert_eq!(crf.len(), 1);
        assert!(crf[0].is_error());
    }

    #[tokio::test]
    async fn test_subtitle_plan() {
        let profile = EncodingProfile::new("subs").with_subtitle(SubtitleConfig::default());
        let plan = resolver(Vec::new()).resolve(Arc::new(profile)).await.unwrap();
        assert_eq!(plan.subtitle.unwrap().codec.encoder(), "webvtt");

        let mp4 = EncodingProfile::new("subs").with_container("mp4").with_subtitle(SubtitleConfig::default());
        let report = resolver(Vec::new()).validate(&mp4).await;
        assert_eq!(report.for_field("subtitle.codec").count(), 1);
    }

    #[tokio::test]
    async fn test_jobs_get_independent_codecs() {
        let resolver = resolver(Vec::new());
        let profile = Arc::new(EncodingProfile::new("web"));
        let mut a = resolver.resolve(profile.clone()).await.unwrap();
        let b = resolver.resolve(profile).await.unwrap();
        a.video.codec.settings_mut().bitrate_kbps = Some(1);
        assert_eq!(b.video.codec.settings().bitrate_kbps, Some(5000));
    }
}
