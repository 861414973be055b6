//! Accelerator detection backends.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::error::HardwareError;
use super::types::{GpuAccelerator, GpuVendor};
use crate::capability::AcceleratorFamily;

/// Something that can enumerate hardware encoders.
#[async_trait]
pub trait AcceleratorProbe: Send + Sync {
    /// Returns the name of this probe implementation.
    fn name(&self) -> &str;

    /// Enumerates accelerators. Called at most once per service lifetime.
    async fn detect(&self) -> Result<Vec<GpuAccelerator>, HardwareError>;
}

/// Detects accelerators from the encoder list of an ffmpeg binary.
pub struct FfmpegEncoderProbe {
    ffmpeg_path: PathBuf,
    vaapi_device: Option<String>,
    timeout_secs: u64,
}

impl FfmpegEncoderProbe {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            vaapi_device: None,
            timeout_secs: 10,
        }
    }

    /// Render node attached to VA-API and QSV accelerators.
    pub fn with_vaapi_device(mut self, device: impl Into<String>) -> Self {
        self.vaapi_device = Some(device.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Groups hardware encoder ids from `ffmpeg -encoders` output by vendor.
    pub(crate) fn parse_encoders(&self, stdout: &str) -> Vec<GpuAccelerator> {
        let families = [
            AcceleratorFamily::Nvenc,
            AcceleratorFamily::Qsv,
            AcceleratorFamily::Amf,
            AcceleratorFamily::VideoToolbox,
            AcceleratorFamily::Vaapi,
        ];

        // Encoder rows look like " V....D h264_nvenc   NVIDIA NVENC H.264 encoder"
        let ids: Vec<&str> = stdout
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let flags = parts.next()?;
                let id = parts.next()?;
                (flags.len() == 6 && flags.starts_with('V')).then_some(id)
            })
            .collect();

        families
            .iter()
            .filter_map(|family| {
                let suffix = format!("_{}", family.suffix());
                let encoders: Vec<String> = ids
                    .iter()
                    .filter(|id| id.ends_with(&suffix))
                    .map(|id| id.to_string())
                    .collect();
                if encoders.is_empty() {
                    return None;
                }
                let vendor = GpuVendor::from_accelerator_family(*family);
                let mut gpu = GpuAccelerator::new(vendor, family.suffix()).with_encoders(encoders);
                if matches!(family, AcceleratorFamily::Qsv | AcceleratorFamily::Vaapi) {
                    if let Some(ref device) = self.vaapi_device {
                        gpu = gpu.with_device(device.clone());
                    }
                }
                Some(gpu)
            })
            .collect()
    }
}

#[async_trait]
impl AcceleratorProbe for FfmpegEncoderProbe {
    fn name(&self) -> &str {
        "ffmpeg-encoders"
    }

    async fn detect(&self) -> Result<Vec<GpuAccelerator>, HardwareError> {
        let run = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.timeout_secs), run)
            .await
            .map_err(|_| HardwareError::Timeout {
                timeout_secs: self.timeout_secs,
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HardwareError::FfmpegNotFound {
                        path: self.ffmpeg_path.clone(),
                    }
                } else {
                    HardwareError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(HardwareError::probe_failed(format!(
                "ffmpeg -encoders exited with code: {:?}",
                output.status.code()
            )));
        }

        Ok(self.parse_encoders(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder (codec hevc)
 V....D h264_vaapi           H.264/AVC (VAAPI) (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn test_parse_encoders_groups_by_vendor() {
        let probe = FfmpegEncoderProbe::new("ffmpeg").with_vaapi_device("/dev/dri/renderD128");
        let gpus = probe.parse_encoders(ENCODERS);
        assert_eq!(gpus.len(), 2);

        assert_eq!(gpus[0].vendor, GpuVendor::Nvidia);
        assert_eq!(gpus[0].encoders, vec!["h264_nvenc", "hevc_nvenc"]);
        assert_eq!(gpus[0].device, None);

        assert_eq!(gpus[1].vendor, GpuVendor::Unknown);
        assert_eq!(gpus[1].device.as_deref(), Some("/dev/dri/renderD128"));
    }

    #[test]
    fn test_parse_encoders_software_only() {
        let probe = FfmpegEncoderProbe::new("ffmpeg");
        let gpus = probe.parse_encoders(" V....D libx264   libx264 H.264\n A....D aac   AAC\n");
        assert!(gpus.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let probe = FfmpegEncoderProbe::new("/nonexistent/ffmpeg-binary");
        let err = probe.detect().await.unwrap_err();
        assert!(matches!(err, HardwareError::FfmpegNotFound { .. }));
    }
}
