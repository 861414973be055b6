//! Output assembly once a job's tasks are done.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::config::OutputConfig;
use super::error::OutputError;
use super::manifest::{AlternateMedia, MasterPlaylist, MediaPlaylist, MediaType, Variant};
use super::validator::{check_bandwidth_ladder, check_codec_tags, check_media_playlist};
use crate::capability::TrackKind;
use crate::job::{EncodingJob, Task, TaskStatus};

const AUDIO_GROUP: &str = "audio";
const SUBTITLE_GROUP: &str = "subs";

/// Assembles and validates the final output of a job.
///
/// Task success is necessary but not sufficient: a job whose tasks all
/// succeeded still fails here if its output is structurally broken.
#[derive(Debug, Clone)]
pub struct OutputOrchestrator {
    config: OutputConfig,
}

impl OutputOrchestrator {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Validates the outputs of every succeeded task. For segmented jobs,
    /// also writes subtitle playlists and the master playlist and returns
    /// its path.
    pub async fn finalize(&self, job: &EncodingJob) -> Result<Option<PathBuf>, OutputError> {
        let done: Vec<&Task> = job
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded)
            .collect();

        if !done.iter().any(|t| t.segmented) {
            self.check_files(&done).await?;
            debug!(job_id = %job.id, outputs = done.len(), "Output files verified");
            return Ok(None);
        }

        let mut violations = Vec::new();
        for task in done.iter().filter(|t| t.segmented) {
            violations.extend(
                check_media_playlist(
                    &task.output,
                    self.config.segment_duration_secs,
                    self.config.duration_tolerance_secs,
                )
                .await?,
            );
        }

        let master = self.build_master(job, &done).await?;
        violations.extend(check_bandwidth_ladder(&master.variants));
        violations.extend(check_codec_tags(&master.variants, &master.media));

        if !violations.is_empty() {
            for v in &violations {
                warn!(job_id = %job.id, violation = %v, "Output validation failed");
            }
            return Err(OutputError::Invalid { violations });
        }

        let path = job.output_dir.join(&self.config.master_playlist_name);
        tokio::fs::write(&path, master.render()).await?;
        info!(job_id = %job.id, master = %path.display(), variants = master.variants.len(), "Master playlist written");
        Ok(Some(path))
    }

    async fn check_files(&self, tasks: &[&Task]) -> Result<(), OutputError> {
        let mut violations = Vec::new();
        for task in tasks {
            match tokio::fs::metadata(&task.output).await {
                Ok(meta) if meta.len() > 0 => {}
                Ok(_) => violations.push(format!("{} is empty", task.output.display())),
                Err(_) => violations.push(format!("{} is missing", task.output.display())),
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(OutputError::Invalid { violations })
        }
    }

    async fn build_master(&self, job: &EncodingJob, tasks: &[&Task]) -> Result<MasterPlaylist, OutputError> {
        let root = job.output_dir.as_path();
        let mut master = MasterPlaylist::default();

        let audio: Vec<&&Task> = tasks.iter().filter(|t| t.kind == TrackKind::Audio).collect();
        for (i, task) in audio.iter().enumerate() {
            master.media.push(AlternateMedia {
                media_type: MediaType::Audio,
                group_id: AUDIO_GROUP.to_string(),
                name: media_name(task),
                language: task.stream.language.clone(),
                uri: relative_uri(root, &task.output),
                default: i == 0,
                codecs: task.stream.codec_tag.clone(),
            });
        }

        let subtitles: Vec<&&Task> = tasks.iter().filter(|t| t.kind == TrackKind::Subtitle).collect();
        for task in &subtitles {
            let playlist_path = self.write_subtitle_playlist(task).await?;
            master.media.push(AlternateMedia {
                media_type: MediaType::Subtitles,
                group_id: SUBTITLE_GROUP.to_string(),
                name: media_name(task),
                language: task.stream.language.clone(),
                uri: relative_uri(root, &playlist_path),
                default: false,
                codecs: task.stream.codec_tag.clone(),
            });
        }

        let audio_bandwidth = audio.iter().map(|t| t.stream.bandwidth_bps).max();
        let audio_tag = audio.first().and_then(|t| t.stream.codec_tag.clone());
        for task in tasks.iter().filter(|t| t.kind == TrackKind::Video) {
            let codecs = task.stream.codec_tag.as_ref().map(|video| match audio_tag {
                Some(ref audio) => format!("{},{}", video, audio),
                None => video.clone(),
            });
            master.variants.push(Variant {
                uri: relative_uri(root, &task.output),
                bandwidth: task.stream.bandwidth_bps + audio_bandwidth.unwrap_or(0),
                resolution: task.stream.width.zip(task.stream.height),
                frame_rate: task.stream.framerate,
                codecs,
                audio_group: audio_bandwidth.map(|_| AUDIO_GROUP.to_string()),
                subtitle_group: (!subtitles.is_empty()).then(|| SUBTITLE_GROUP.to_string()),
            });
        }
        Ok(master)
    }

    /// Wraps a sidecar subtitle file in a one-segment playlist next to it.
    async fn write_subtitle_playlist(&self, task: &Task) -> Result<PathBuf, OutputError> {
        let meta = tokio::fs::metadata(&task.output).await;
        if !meta.is_ok_and(|m| m.len() > 0) {
            return Err(OutputError::Invalid {
                violations: vec![format!("{} is missing or empty", task.output.display())],
            });
        }
        let file_name = task
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let playlist = MediaPlaylist::single(file_name, task.duration_secs.max(1.0));
        let path = task.output.with_extension("m3u8");
        tokio::fs::write(&path, playlist.render()).await?;
        Ok(path)
    }
}

fn media_name(task: &Task) -> String {
    task.stream.language.clone().unwrap_or_else(|| task.name.clone())
}

/// `path` relative to the master playlist, with `/` separators.
fn relative_uri(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
