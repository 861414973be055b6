//! Encode plan + probed input -> ordered tasks.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::SplitError;
use super::filters::{scaled_width, video_filter_chain};
use crate::capability::{ContainerDescriptor, OptionMap, TrackKind};
use crate::job::{JobId, StreamInfo, Task};
use crate::probe::{AudioStream, ProbedInput, SubtitleStream, VideoStream};
use crate::profile::{EncodePlan, Rendition};

/// Playlist written by every segmented task.
pub const MEDIA_PLAYLIST: &str = "index.m3u8";

/// Splits an encode plan into independently executable tasks.
///
/// Order (and `priority`) is video by descending bitrate, then audio, then
/// subtitles, each in stream order. All video tasks and the first audio
/// task are required.
#[derive(Debug, Clone)]
pub struct TaskSplitter {
    segment_duration_secs: f64,
}

impl TaskSplitter {
    pub fn new(segment_duration_secs: f64) -> Self {
        Self {
            segment_duration_secs,
        }
    }

    pub fn split(
        &self,
        job_id: JobId,
        plan: &EncodePlan,
        input: &ProbedInput,
        output_dir: &Path,
    ) -> Result<Vec<Task>, SplitError> {
        let mut tasks = Vec::new();

        match input.primary_video() {
            Some(source) => {
                for rendition in select_renditions(&plan.video.renditions, source.height) {
                    tasks.push(self.video_task(job_id, plan, input, source, &rendition, output_dir));
                }
            }
            None => warn!(input = %input.path.display(), "Input has no video stream"),
        }

        for (n, stream) in input.audio_streams.iter().enumerate() {
            let mut task = self.audio_task(job_id, plan, input, stream, n + 1, output_dir);
            task.required = n == 0;
            tasks.push(task);
        }

        if let Some(ref subtitle) = plan.subtitle {
            let text: Vec<&SubtitleStream> =
                input.subtitle_streams.iter().filter(|s| s.text_based).collect();
            let skipped = input.subtitle_streams.len() - text.len();
            if skipped > 0 {
                debug!(skipped, "Skipping image-based subtitle streams");
            }
            for (n, stream) in text.into_iter().enumerate() {
                let mut task = Task::new(
                    job_id,
                    format!("subtitle-{}", n + 1),
                    TrackKind::Subtitle,
                    subtitle.codec.encoder(),
                );
                task.required = false;
                task.input = input.path.clone();
                task.duration_secs = input.duration_secs;

                let mut options = OptionMap::new().with("-map", format!("0:{}", stream.index));
                options.extend(&subtitle.codec.args());
                options.extend(&subtitle.extra_options);

                if plan.container.is_segmented() {
                    // Sidecar file; the output step wraps it in a playlist.
                    options.insert("-f", "webvtt");
                    task.output = output_dir.join("subtitles").join(format!("sub_{}.vtt", n + 1));
                } else {
                    options.insert("-f", plan.container.muxer());
                    task.output = flat_output(output_dir, &task.name, &plan.container);
                }
                task.options = options;
                task.stream = StreamInfo {
                    codec_tag: subtitle.codec.codec_tag(),
                    language: stream.language.clone(),
                    ..StreamInfo::default()
                };
                tasks.push(task);
            }
        }

        if tasks.is_empty() {
            return Err(SplitError::NothingToEncode {
                path: input.path.display().to_string(),
            });
        }

        for (priority, task) in tasks.iter_mut().enumerate() {
            task.priority = priority as u32;
        }
        debug!(job_id = %job_id, tasks = tasks.len(), "Split job into tasks");
        Ok(tasks)
    }

    fn video_task(
        &self,
        job_id: JobId,
        plan: &EncodePlan,
        input: &ProbedInput,
        source: &VideoStream,
        rendition: &Rendition,
        output_dir: &Path,
    ) -> Task {
        let video = &plan.video;
        let mut codec = video.codec.clone();
        {
            let s = codec.settings_mut();
            s.bitrate_kbps = Some(rendition.bitrate_kbps);
            s.max_bitrate_kbps = rendition.max_bitrate_kbps.or(s.max_bitrate_kbps);
        }

        let mut task = Task::new(
            job_id,
            format!("video-{}", rendition.name),
            TrackKind::Video,
            codec.encoder(),
        );
        task.input = input.path.clone();
        task.duration_secs = input.duration_secs;
        task.pre_input = video.pre_input.clone();

        let single = video.renditions.len() == 1;
        let width = if single { video.width } else { None };
        let scale = rendition.height != source.height || width.is_some();
        let tonemap = video.hdr_to_sdr && source.hdr;

        let mut options = OptionMap::new().with("-map", format!("0:{}", source.index));
        options.extend(&codec.args());
        if let Some(chain) = video_filter_chain(tonemap, width, rendition.height, scale, video.accelerator.as_ref()) {
            options.insert("-vf", chain);
        }
        if let Some(fps) = video.framerate {
            options.insert("-r", format_number(fps));
        }
        options.extend(&video.extra_options);

        if plan.container.is_segmented() {
            let dir = output_dir.join(&rendition.name);
            options.insert(
                "-force_key_frames",
                format!("expr:gte(t,n_forced*{})", format_number(self.segment_duration_secs)),
            );
            options.extend(&self.hls_options(&dir));
            task.output = dir.join(MEDIA_PLAYLIST);
            task.segmented = true;
        } else {
            options.insert("-f", plan.container.muxer());
            task.output = flat_output(output_dir, &rendition.name, &plan.container);
        }
        options.extend(&plan.overrides);
        task.options = options;

        let peak = rendition.max_bitrate_kbps.unwrap_or(rendition.bitrate_kbps);
        task.stream = StreamInfo {
            bandwidth_bps: peak as u64 * 1000,
            width: width.or_else(|| scaled_width(source.width, source.height, rendition.height)),
            height: Some(rendition.height),
            framerate: video.framerate.or(source.framerate),
            codec_tag: codec.codec_tag(),
            language: None,
        };
        task
    }

    fn audio_task(
        &self,
        job_id: JobId,
        plan: &EncodePlan,
        input: &ProbedInput,
        stream: &AudioStream,
        n: usize,
        output_dir: &Path,
    ) -> Task {
        let codec = &plan.audio.codec;
        let mut task = Task::new(job_id, format!("audio-{}", n), TrackKind::Audio, codec.encoder());
        task.input = input.path.clone();
        task.duration_secs = input.duration_secs;

        let mut options = OptionMap::new().with("-map", format!("0:{}", stream.index));
        options.extend(&codec.args());
        options.extend(&plan.audio.extra_options);

        if plan.container.is_segmented() {
            let dir = output_dir.join(format!("audio_{}", n));
            options.extend(&self.hls_options(&dir));
            task.output = dir.join(MEDIA_PLAYLIST);
            task.segmented = true;
        } else {
            options.insert("-f", plan.container.muxer());
            task.output = flat_output(output_dir, &task.name, &plan.container);
        }
        task.options = options;
        task.stream = StreamInfo {
            bandwidth_bps: codec.settings().bitrate_kbps.unwrap_or(128) as u64 * 1000,
            codec_tag: codec.codec_tag(),
            language: stream.language.clone(),
            ..StreamInfo::default()
        };
        task
    }

    fn hls_options(&self, dir: &Path) -> OptionMap {
        OptionMap::new()
            .with("-f", "hls")
            .with("-hls_time", format_number(self.segment_duration_secs))
            .with("-hls_playlist_type", "vod")
            .with(
                "-hls_segment_filename",
                dir.join("segment_%05d.ts").to_string_lossy().into_owned(),
            )
    }
}

/// Renditions no taller than the source, by descending bitrate. When every
/// rendition would upscale, the smallest one is kept.
pub(crate) fn select_renditions(renditions: &[Rendition], source_height: u32) -> Vec<Rendition> {
    let mut kept: Vec<Rendition> = renditions
        .iter()
        .filter(|r| source_height == 0 || r.height <= source_height)
        .cloned()
        .collect();
    if kept.is_empty() {
        if let Some(smallest) = renditions.iter().min_by_key(|r| r.height) {
            debug!(rendition = %smallest.name, source_height, "All renditions upscale; keeping smallest");
            kept.push(smallest.clone());
        }
    }
    kept.sort_by(|a, b| b.bitrate_kbps.cmp(&a.bitrate_kbps));
    kept
}

fn flat_output(output_dir: &Path, name: &str, container: &ContainerDescriptor) -> PathBuf {
    output_dir.join(format!("{}.{}", name, container.extension()))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OptionValue;
    use crate::hardware::{GpuAccelerator, GpuVendor, HardwareAcceleratorService};
    use crate::profile::{EncodingProfile, ProfileResolver, SubtitleConfig};
    use crate::testing::{fixtures, StaticAcceleratorProbe};
    use std::sync::Arc;
    use uuid::Uuid;

    async fn plan_for(profile: EncodingProfile, gpus: Vec<GpuAccelerator>) -> EncodePlan {
        let probe = Arc::new(StaticAcceleratorProbe::new(gpus));
        ProfileResolver::new(Arc::new(HardwareAcceleratorService::new(probe)))
            .resolve(Arc::new(profile))
            .await
            .unwrap()
    }

    fn ladder_profile() -> EncodingProfile {
        let mut profile = EncodingProfile::new("ladder");
        profile.video.renditions = vec![
            Rendition::new("720p", 720, 3000),
            Rendition::new("1080p", 1080, 6000),
            Rendition::new("2160p", 2160, 16000),
            Rendition::new("480p", 480, 1200),
        ];
        profile
    }

    #[tokio::test]
    async fn test_order_and_priority() {
        let plan = plan_for(ladder_profile().with_subtitle(SubtitleConfig::default()), Vec::new()).await;
        let input = fixtures::probed_input_1080p();
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &input, Path::new("/out"))
            .unwrap();

        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["video-1080p", "video-720p", "video-480p", "audio-1", "audio-2", "subtitle-1"]
        );
        let priorities: Vec<u32> = tasks.iter().map(|t| t.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_required_flags() {
        let plan = plan_for(ladder_profile().with_subtitle(SubtitleConfig::default()), Vec::new()).await;
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();

        for task in &tasks {
            let expected = task.kind == TrackKind::Video || task.name == "audio-1";
            assert_eq!(task.required, expected, "{}", task.name);
        }
    }

    #[tokio::test]
    async fn test_hls_video_options() {
        let plan = plan_for(ladder_profile(), Vec::new()).await;
        let tasks = TaskSplitter::new(4.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        let v720 = tasks.iter().find(|t| t.name == "video-720p").unwrap();

        assert_eq!(v720.output, PathBuf::from("/out/720p/index.m3u8"));
        assert!(v720.segmented);
        assert_eq!(v720.codec, "libx264");
        assert_eq!(v720.options.get_str("-map"), Some("0:0"));
        assert_eq!(v720.options.get_str("-b:v"), Some("3000k"));
        assert_eq!(v720.options.get_str("-vf"), Some("scale=-2:720"));
        assert_eq!(v720.options.get_str("-f"), Some("hls"));
        assert_eq!(v720.options.get_str("-hls_time"), Some("4"));
        assert_eq!(
            v720.options.get_str("-hls_segment_filename"),
            Some("/out/720p/segment_%05d.ts")
        );
        assert_eq!(v720.stream.bandwidth_bps, 3_000_000);
        assert_eq!(v720.stream.width, Some(1280));
        assert_eq!(v720.stream.codec_tag.as_deref(), Some("avc1.640028"));

        let v1080 = tasks.iter().find(|t| t.name == "video-1080p").unwrap();
        assert!(v1080.options.get("-vf").is_none());
    }

    #[tokio::test]
    async fn test_never_upscales_but_keeps_smallest() {
        let mut profile = EncodingProfile::new("big");
        profile.video.renditions = vec![Rendition::new("2160p", 2160, 16000), Rendition::new("1440p", 1440, 9000)];
        let plan = plan_for(profile, Vec::new()).await;
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        let videos: Vec<&str> = tasks
            .iter()
            .filter(|t| t.kind == TrackKind::Video)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(videos, vec!["video-1440p"]);
    }

    #[tokio::test]
    async fn test_hardware_task_carries_pre_input_and_upload() {
        let plan = plan_for(ladder_profile(), vec![GpuAccelerator::new(GpuVendor::Intel, "qsv")]).await;
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        let v720 = tasks.iter().find(|t| t.name == "video-720p").unwrap();

        assert_eq!(v720.codec, "h264_qsv");
        assert!(matches!(v720.pre_input.get("-init_hw_device"), Some(OptionValue::Repeated(v)) if v.len() == 2));
        assert_eq!(
            v720.options.get_str("-vf"),
            Some("scale=-2:720,hwupload=extra_hw_frames=64,format=qsv")
        );
    }

    #[tokio::test]
    async fn test_tonemap_only_for_hdr_input() {
        let mut profile = EncodingProfile::new("sdr");
        profile.video.hdr_to_sdr = true;
        let plan = plan_for(profile, Vec::new()).await;

        let sdr = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        assert!(sdr[0].options.get("-vf").is_none());

        let mut hdr_input = fixtures::probed_input_1080p();
        hdr_input.video_streams[0].hdr = true;
        let hdr = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &hdr_input, Path::new("/out"))
            .unwrap();
        assert!(hdr[0].options.get_str("-vf").unwrap().starts_with("zscale=t=linear"));
    }

    #[tokio::test]
    async fn test_flat_container_outputs() {
        let plan = plan_for(EncodingProfile::new("mkv").with_container("mkv"), Vec::new()).await;
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        assert_eq!(tasks[0].output, PathBuf::from("/out/1080p.mkv"));
        assert_eq!(tasks[0].options.get_str("-f"), Some("matroska"));
        assert!(!tasks[0].segmented);
        assert_eq!(tasks[1].output, PathBuf::from("/out/audio-1.mkv"));
    }

    #[tokio::test]
    async fn test_overrides_apply_last_to_video() {
        let mut profile = EncodingProfile::new("o");
        profile.overrides = OptionMap::new().with("-b:v", "4500k").with("-movflags", "+faststart");
        let plan = plan_for(profile, Vec::new()).await;
        let tasks = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &fixtures::probed_input_1080p(), Path::new("/out"))
            .unwrap();
        let video = &tasks[0];
        assert_eq!(video.options.get_str("-b:v"), Some("4500k"));
        assert_eq!(video.options.keys().last(), Some("-movflags"));
        assert!(tasks[1].options.get("-movflags").is_none());
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let plan = plan_for(EncodingProfile::new("x"), Vec::new()).await;
        let mut input = fixtures::probed_input_1080p();
        input.video_streams.clear();
        input.audio_streams.clear();
        let err = TaskSplitter::new(6.0)
            .split(Uuid::new_v4(), &plan, &input, Path::new("/out"))
            .unwrap_err();
        assert!(matches!(err, SplitError::NothingToEncode { .. }));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(6.0), "6");
        assert_eq!(format_number(23.976), "23.976");
    }
}
