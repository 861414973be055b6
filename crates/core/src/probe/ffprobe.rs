//! ffprobe-backed input prober.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::error::ProbeError;
use super::types::{is_text_subtitle, AudioStream, ProbedInput, SubtitleStream, VideoStream};

/// Describes the streams of an input file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<ProbedInput, ProbeError>;
}

/// Runs `ffprobe -print_format json -show_format -show_streams`.
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Parses ffprobe JSON output.
    pub fn parse_output(path: &Path, output: &str) -> Result<ProbedInput, ProbeError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            index: u32,
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            avg_frame_rate: Option<String>,
            pix_fmt: Option<String>,
            color_transfer: Option<String>,
            #[serde(default)]
            tags: HashMap<String, String>,
            #[serde(default)]
            disposition: HashMap<String, i64>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| ProbeError::ParseError {
            reason: format!("Failed to parse ffprobe output: {}", e),
        })?;

        let kbps = |b: &Option<String>| b.as_ref().and_then(|b| b.parse::<u32>().ok()).map(|b| b / 1000);

        let mut input = ProbedInput {
            path: path.to_path_buf(),
            format: probe
                .format
                .format_name
                .split(',')
                .next()
                .unwrap_or("unknown")
                .to_string(),
            duration_secs: probe
                .format
                .duration
                .as_ref()
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0),
            size_bytes: probe
                .format
                .size
                .as_ref()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
            video_streams: Vec::new(),
            audio_streams: Vec::new(),
            subtitle_streams: Vec::new(),
        };

        for stream in probe.streams {
            let codec = stream.codec_name.clone().unwrap_or_else(|| "unknown".to_string());
            let language = stream.tags.get("language").cloned();
            match stream.codec_type.as_str() {
                "video" => {
                    // cover art and thumbnails are video streams too
                    if stream.disposition.get("attached_pic").copied() == Some(1) {
                        continue;
                    }
                    input.video_streams.push(VideoStream {
                        index: stream.index,
                        codec,
                        width: stream.width.unwrap_or(0),
                        height: stream.height.unwrap_or(0),
                        framerate: stream
                            .avg_frame_rate
                            .as_deref()
                            .and_then(parse_frame_rate)
                            .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate)),
                        bitrate_kbps: kbps(&stream.bit_rate),
                        pixel_format: stream.pix_fmt.clone(),
                        hdr: matches!(
                            stream.color_transfer.as_deref(),
                            Some("smpte2084") | Some("arib-std-b67")
                        ),
                    });
                }
                "audio" => input.audio_streams.push(AudioStream {
                    index: stream.index,
                    codec,
                    channels: stream.channels,
                    sample_rate_hz: stream.sample_rate.as_ref().and_then(|r| r.parse::<u32>().ok()),
                    bitrate_kbps: kbps(&stream.bit_rate),
                    language,
                    default: stream.disposition.get("default").copied() == Some(1),
                }),
                "subtitle" => input.subtitle_streams.push(SubtitleStream {
                    index: stream.index,
                    text_based: is_text_subtitle(&codec),
                    codec,
                    language,
                }),
                _ => {}
            }
        }

        Ok(input)
    }
}

/// Parses a frame rate like "24000/1001" or "25".
fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().ok()?;
            let den = den.parse::<f64>().ok()?;
            (den > 0.0 && num > 0.0).then(|| num / den)
        }
        None => rate.parse::<f64>().ok().filter(|r| *r > 0.0),
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<ProbedInput, ProbeError> {
        if !path.exists() {
            return Err(ProbeError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProbeError::FfprobeNotFound {
                        path: self.ffprobe_path.clone(),
                    }
                } else {
                    ProbeError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(ProbeError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        Self::parse_output(path, &String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVIE: &str = r#"{
        "format": {
            "filename": "movie.mkv",
            "format_name": "matroska,webm",
            "duration": "5400.25",
            "size": "4000000000"
        },
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "codec_name": "hevc",
                "width": 3840,
                "height": 2160,
                "avg_frame_rate": "24000/1001",
                "r_frame_rate": "24000/1001",
                "pix_fmt": "yuv420p10le",
                "color_transfer": "smpte2084"
            },
            {
                "index": 1,
                "codec_type": "audio",
                "codec_name": "eac3",
                "channels": 6,
                "sample_rate": "48000",
                "bit_rate": "640000",
                "tags": {"language": "eng"},
                "disposition": {"default": 1}
            },
            {
                "index": 2,
                "codec_type": "audio",
                "codec_name": "aac",
                "channels": 2,
                "tags": {"language": "ita"}
            },
            {
                "index": 3,
                "codec_type": "subtitle",
                "codec_name": "subrip",
                "tags": {"language": "eng"}
            },
            {
                "index": 4,
                "codec_type": "subtitle",
                "codec_name": "hdmv_pgs_subtitle"
            },
            {
                "index": 5,
                "codec_type": "video",
                "codec_name": "mjpeg",
                "width": 600,
                "height": 900,
                "disposition": {"attached_pic": 1}
            }
        ]
    }"#;

    #[test]
    fn test_parse_movie() {
        let input = FfprobeProber::parse_output(Path::new("movie.mkv"), MOVIE).unwrap();
        assert_eq!(input.format, "matroska");
        assert!((input.duration_secs - 5400.25).abs() < 0.001);
        assert_eq!(input.video_streams.len(), 1);

        let video = input.primary_video().unwrap();
        assert_eq!(video.height, 2160);
        assert!(video.hdr);
        assert!((video.framerate.unwrap() - 23.976).abs() < 0.01);
        assert!(input.is_hdr());

        assert_eq!(input.audio_streams.len(), 2);
        assert_eq!(input.audio_streams[0].bitrate_kbps, Some(640));
        assert_eq!(input.audio_streams[0].language.as_deref(), Some("eng"));
        assert!(input.audio_streams[0].default);
        assert!(!input.audio_streams[1].default);

        assert_eq!(input.subtitle_streams.len(), 2);
        assert!(input.subtitle_streams[0].text_based);
        assert!(!input.subtitle_streams[1].text_based);
    }

    #[test]
    fn test_parse_garbage() {
        let err = FfprobeProber::parse_output(Path::new("x"), "not json").unwrap_err();
        assert!(matches!(err, ProbeError::ParseError { .. }));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let prober = FfprobeProber::new("ffprobe");
        let err = prober.probe(Path::new("/nonexistent/input.mkv")).await.unwrap_err();
        assert!(matches!(err, ProbeError::InputNotFound { .. }));
    }
}
