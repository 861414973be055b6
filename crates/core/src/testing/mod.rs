//! Test doubles and fixtures.
//!
//! Public so integration tests and the server crate can drive the
//! dispatcher without ffmpeg or real hardware.
//!
//! # Example
//!
//! ```rust,ignore
//! use encodefleet_core::testing::{MockOutcome, MockTaskRunner};
//!
//! let runner = MockTaskRunner::new().with_outputs(3, 6.0);
//! runner.script("video-720p", vec![MockOutcome::Transient("Connection reset".into())]);
//! ```

mod mock_accelerator_probe;
mod mock_prober;
mod mock_runner;

pub use mock_accelerator_probe::StaticAcceleratorProbe;
pub use mock_prober::StaticMediaProber;
pub use mock_runner::{write_hls_output, AttemptRecord, MockOutcome, MockTaskRunner};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::capability::TrackKind;
    use crate::job::{EncodingJob, StreamInfo, Task};
    use crate::probe::{AudioStream, ProbedInput, SubtitleStream, VideoStream};
    use crate::profile::{EncodingProfile, PlanSummary};

    /// A two-minute 1080p24 input with two audio tracks, one text and one
    /// bitmap subtitle.
    pub fn probed_input_1080p() -> ProbedInput {
        ProbedInput {
            path: PathBuf::from("/media/input.mkv"),
            format: "matroska,webm".to_string(),
            duration_secs: 120.0,
            size_bytes: 512 * 1024 * 1024,
            video_streams: vec![VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                framerate: Some(24.0),
                bitrate_kbps: Some(12_000),
                pixel_format: Some("yuv420p".to_string()),
                hdr: false,
            }],
            audio_streams: vec![
                AudioStream {
                    index: 1,
                    codec: "ac3".to_string(),
                    channels: Some(6),
                    sample_rate_hz: Some(48_000),
                    bitrate_kbps: Some(448),
                    language: Some("eng".to_string()),
                    default: true,
                },
                AudioStream {
                    index: 2,
                    codec: "aac".to_string(),
                    channels: Some(2),
                    sample_rate_hz: Some(48_000),
                    bitrate_kbps: Some(128),
                    language: Some("fre".to_string()),
                    default: false,
                },
            ],
            subtitle_streams: vec![
                SubtitleStream {
                    index: 3,
                    codec: "subrip".to_string(),
                    language: Some("eng".to_string()),
                    text_based: true,
                },
                SubtitleStream {
                    index: 4,
                    codec: "hdmv_pgs_subtitle".to_string(),
                    language: Some("eng".to_string()),
                    text_based: false,
                },
            ],
        }
    }

    /// Audio-and-video-only variant of [`probed_input_1080p`].
    pub fn probed_input_simple() -> ProbedInput {
        let mut input = probed_input_1080p();
        input.audio_streams.truncate(1);
        input.subtitle_streams.clear();
        input
    }

    pub fn plan_summary(profile: &EncodingProfile) -> PlanSummary {
        PlanSummary {
            profile: profile.name.clone(),
            version: profile.version,
            container: profile.container.clone(),
            video_encoder: "libx264".to_string(),
            hardware: false,
            audio_encoder: "aac".to_string(),
            subtitle_encoder: None,
            renditions: Vec::new(),
        }
    }

    /// A job with no tasks.
    pub fn empty_job() -> EncodingJob {
        let profile = Arc::new(EncodingProfile::new("default"));
        let plan = plan_summary(&profile);
        EncodingJob::new(
            uuid::Uuid::new_v4(),
            PathBuf::from("/media/input.mkv"),
            PathBuf::from("/out"),
            profile,
            plan,
            Vec::new(),
        )
    }

    /// An HLS job writing under `dir`: 1080p and 720p video plus one audio
    /// track, as the splitter would lay them out.
    pub fn hls_job(dir: &Path) -> EncodingJob {
        let mut job = empty_job();
        job.output_dir = dir.to_path_buf();

        let mut tasks = vec![
            video_task(&job, "1080p", 1920, 1080, 6_000_000),
            video_task(&job, "720p", 1280, 720, 3_000_000),
        ];
        let mut audio = Task::new(job.id, "audio-1", TrackKind::Audio, "aac");
        audio.output = dir.join("audio_1").join("index.m3u8");
        audio.segmented = true;
        audio.duration_secs = 15.0;
        audio.stream = StreamInfo {
            bandwidth_bps: 128_000,
            codec_tag: Some("mp4a.40.2".to_string()),
            language: Some("eng".to_string()),
            ..StreamInfo::default()
        };
        tasks.push(audio);

        for (i, task) in tasks.iter_mut().enumerate() {
            task.priority = i as u32;
            task.input = job.input.clone();
        }
        job.tasks = tasks;
        job
    }

    fn video_task(job: &EncodingJob, rendition: &str, width: u32, height: u32, bandwidth: u64) -> Task {
        let mut task = Task::new(job.id, format!("video-{}", rendition), TrackKind::Video, "libx264");
        task.output = job.output_dir.join(rendition).join("index.m3u8");
        task.segmented = true;
        task.duration_secs = 15.0;
        task.stream = StreamInfo {
            bandwidth_bps: bandwidth,
            width: Some(width),
            height: Some(height),
            framerate: Some(24.0),
            codec_tag: Some("avc1.640028".to_string()),
            language: None,
        };
        task
    }
}
