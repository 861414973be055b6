//! Container descriptors.

use super::options::{OptionKind, OptionSchema};
use super::types::TrackKind;

/// A muxing target and the codecs it can carry per track type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub(crate) name: &'static str,
    pub(crate) display_name: &'static str,
    pub(crate) extension: &'static str,
    pub(crate) muxer: &'static str,
    pub(crate) can_mux: bool,
    pub(crate) can_demux: bool,
    pub(crate) segmented: bool,
    pub(crate) video_codecs: &'static [&'static str],
    pub(crate) audio_codecs: &'static [&'static str],
    pub(crate) subtitle_codecs: &'static [&'static str],
}

impl ContainerDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn display_name(&self) -> &'static str {
        self.display_name
    }

    /// Output file extension (for segmented outputs, the playlist's).
    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// ffmpeg `-f` muxer name.
    pub fn muxer(&self) -> &'static str {
        self.muxer
    }

    pub fn can_mux(&self) -> bool {
        self.can_mux
    }

    pub fn can_demux(&self) -> bool {
        self.can_demux
    }

    /// Whether output is a playlist of segments rather than one file.
    pub fn is_segmented(&self) -> bool {
        self.segmented
    }

    /// Canonical codec names supported for a track type.
    pub fn supported_codecs(&self, track: TrackKind) -> &'static [&'static str] {
        match track {
            TrackKind::Video => self.video_codecs,
            TrackKind::Audio => self.audio_codecs,
            TrackKind::Subtitle => self.subtitle_codecs,
        }
    }

    /// Whether `codec` (canonical family name) may be placed in this container.
    pub fn supports(&self, track: TrackKind, codec: &str) -> bool {
        self.supported_codecs(track).contains(&codec)
    }

    /// Option schema for capability discovery.
    pub fn option_schema(&self) -> Vec<OptionSchema> {
        match self.muxer {
            "hls" => vec![
                OptionSchema::integer("hls_time", 1.0, 60.0, "Target segment duration in seconds")
                    .with_default(6),
                OptionSchema::choice("hls_playlist_type", &["vod", "event"], "Playlist type")
                    .with_default("vod"),
                OptionSchema::choice("hls_segment_type", &["mpegts", "fmp4"], "Segment format")
                    .with_default("mpegts"),
            ],
            "mp4" | "mov" => vec![OptionSchema::new(
                "movflags",
                OptionKind::String,
                "MOV/MP4 muxer flags (e.g. +faststart)",
            )],
            "matroska" | "webm" => vec![OptionSchema::integer(
                "cluster_time_limit",
                0.0,
                60_000.0,
                "Maximum cluster duration in milliseconds",
            )],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::capability::factory::lookup_container;
    use crate::capability::types::TrackKind;

    #[test]
    fn test_supports() {
        let webm = lookup_container("webm").unwrap();
        assert!(webm.supports(TrackKind::Video, "vp9"));
        assert!(!webm.supports(TrackKind::Video, "h264"));
        assert!(webm.supports(TrackKind::Audio, "opus"));
        assert!(!webm.supports(TrackKind::Audio, "aac"));
    }

    #[test]
    fn test_hls_is_segmented() {
        let hls = lookup_container("hls").unwrap();
        assert!(hls.is_segmented());
        assert_eq!(hls.extension(), "m3u8");
        assert!(hls.option_schema().iter().any(|o| o.name == "hls_time"));
        assert!(!lookup_container("mp4").unwrap().is_segmented());
    }
}
