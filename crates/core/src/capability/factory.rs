//! Name/alias lookup producing canonical codec and container descriptors.
//!
//! This is the only way to obtain descriptors. Every call returns a fresh
//! value, so callers can configure it without affecting anyone else.

use super::codec::{CodecDescriptor, CodecSpec, QualityControl};
use super::container::ContainerDescriptor;
use super::types::{AcceleratorFamily, CodecFamily, PRESET_SCALE};

const X26X_TUNES: &[&str] = &["film", "animation", "grain", "stillimage", "fastdecode", "zerolatency"];
const NVENC_PRESETS: &[&str] = &["fast", "medium", "slow"];
const QSV_PRESETS: &[&str] = &["veryfast", "faster", "fast", "medium", "slow", "slower", "veryslow"];
const H264_PROFILES: &[&str] = &["baseline", "main", "high"];
const H265_PROFILES: &[&str] = &["main", "main10"];

const fn spec(
    name: &'static str,
    encoder: &'static str,
    display_name: &'static str,
    family: CodecFamily,
) -> CodecSpec {
    CodecSpec {
        name,
        encoder,
        display_name,
        family,
        hardware: None,
        presets: &[],
        profiles: &[],
        tunes: &[],
        quality: QualityControl::None,
    }
}

const SOFTWARE_CODECS: &[CodecSpec] = &[
    CodecSpec {
        presets: &PRESET_SCALE,
        profiles: &["baseline", "main", "high", "high10"],
        tunes: X26X_TUNES,
        quality: QualityControl::Crf { min: 0, max: 51 },
        ..spec("h264", "libx264", "H.264 / AVC (x264)", CodecFamily::H264)
    },
    CodecSpec {
        presets: &PRESET_SCALE,
        profiles: &["main", "main10", "mainstillpicture"],
        tunes: &["animation", "grain", "fastdecode", "zerolatency"],
        quality: QualityControl::Crf { min: 0, max: 51 },
        ..spec("h265", "libx265", "H.265 / HEVC (x265)", CodecFamily::H265)
    },
    CodecSpec {
        profiles: &["0", "1", "2", "3"],
        quality: QualityControl::Crf { min: 0, max: 63 },
        ..spec("vp9", "libvpx-vp9", "VP9 (libvpx)", CodecFamily::Vp9)
    },
    CodecSpec {
        quality: QualityControl::Crf { min: 1, max: 63 },
        ..spec("av1", "libsvtav1", "AV1 (SVT-AV1)", CodecFamily::Av1)
    },
    CodecSpec {
        profiles: &["aac_low", "mpeg2_aac_low", "aac_ltp"],
        ..spec("aac", "aac", "AAC", CodecFamily::Aac)
    },
    spec("opus", "libopus", "Opus", CodecFamily::Opus),
    spec("mp3", "libmp3lame", "MP3 (LAME)", CodecFamily::Mp3),
    spec("ac3", "ac3", "Dolby Digital (AC-3)", CodecFamily::Ac3),
    spec("eac3", "eac3", "Dolby Digital Plus (E-AC-3)", CodecFamily::Eac3),
    spec("flac", "flac", "FLAC", CodecFamily::Flac),
    spec("webvtt", "webvtt", "WebVTT", CodecFamily::WebVtt),
    spec("srt", "srt", "SubRip", CodecFamily::Srt),
    spec("mov_text", "mov_text", "MPEG-4 Timed Text", CodecFamily::MovText),
    spec("ass", "ass", "Advanced SubStation Alpha", CodecFamily::Ass),
];

const fn hw(
    name: &'static str,
    display_name: &'static str,
    family: CodecFamily,
    accel: AcceleratorFamily,
    presets: &'static [&'static str],
    profiles: &'static [&'static str],
    quality: QualityControl,
) -> CodecSpec {
    CodecSpec {
        name,
        encoder: name,
        display_name,
        family,
        hardware: Some(accel),
        presets,
        profiles,
        tunes: &[],
        quality,
    }
}

const HARDWARE_CODECS: &[CodecSpec] = &[
    hw("h264_nvenc", "H.264 (NVIDIA NVENC)", CodecFamily::H264, AcceleratorFamily::Nvenc, NVENC_PRESETS, H264_PROFILES, QualityControl::Cq { min: 0, max: 51 }),
    hw("hevc_nvenc", "H.265 (NVIDIA NVENC)", CodecFamily::H265, AcceleratorFamily::Nvenc, NVENC_PRESETS, H265_PROFILES, QualityControl::Cq { min: 0, max: 51 }),
    hw("av1_nvenc", "AV1 (NVIDIA NVENC)", CodecFamily::Av1, AcceleratorFamily::Nvenc, NVENC_PRESETS, &["main"], QualityControl::Cq { min: 0, max: 51 }),
    hw("h264_qsv", "H.264 (Intel Quick Sync)", CodecFamily::H264, AcceleratorFamily::Qsv, QSV_PRESETS, H264_PROFILES, QualityControl::GlobalQuality { min: 1, max: 51 }),
    hw("hevc_qsv", "H.265 (Intel Quick Sync)", CodecFamily::H265, AcceleratorFamily::Qsv, QSV_PRESETS, H265_PROFILES, QualityControl::GlobalQuality { min: 1, max: 51 }),
    hw("av1_qsv", "AV1 (Intel Quick Sync)", CodecFamily::Av1, AcceleratorFamily::Qsv, QSV_PRESETS, &["main"], QualityControl::GlobalQuality { min: 1, max: 51 }),
    hw("vp9_qsv", "VP9 (Intel Quick Sync)", CodecFamily::Vp9, AcceleratorFamily::Qsv, QSV_PRESETS, &[], QualityControl::GlobalQuality { min: 1, max: 51 }),
    hw("h264_amf", "H.264 (AMD AMF)", CodecFamily::H264, AcceleratorFamily::Amf, &[], H264_PROFILES, QualityControl::Qp { min: 0, max: 51 }),
    hw("hevc_amf", "H.265 (AMD AMF)", CodecFamily::H265, AcceleratorFamily::Amf, &[], &["main"], QualityControl::Qp { min: 0, max: 51 }),
    hw("av1_amf", "AV1 (AMD AMF)", CodecFamily::Av1, AcceleratorFamily::Amf, &[], &["main"], QualityControl::Qp { min: 0, max: 255 }),
    hw("h264_videotoolbox", "H.264 (Apple VideoToolbox)", CodecFamily::H264, AcceleratorFamily::VideoToolbox, &[], H264_PROFILES, QualityControl::None),
    hw("hevc_videotoolbox", "H.265 (Apple VideoToolbox)", CodecFamily::H265, AcceleratorFamily::VideoToolbox, &[], H265_PROFILES, QualityControl::None),
    hw("h264_vaapi", "H.264 (VA-API)", CodecFamily::H264, AcceleratorFamily::Vaapi, &[], H264_PROFILES, QualityControl::Qp { min: 0, max: 52 }),
    hw("hevc_vaapi", "H.265 (VA-API)", CodecFamily::H265, AcceleratorFamily::Vaapi, &[], H265_PROFILES, QualityControl::Qp { min: 0, max: 52 }),
];

/// Aliases mapped to canonical software codec names.
const CODEC_ALIASES: &[(&str, &str)] = &[
    ("avc", "h264"),
    ("avc1", "h264"),
    ("x264", "h264"),
    ("libx264", "h264"),
    ("hevc", "h265"),
    ("x265", "h265"),
    ("libx265", "h265"),
    ("hvc1", "h265"),
    ("hev1", "h265"),
    ("libvpx-vp9", "vp9"),
    ("vp09", "vp9"),
    ("libaom-av1", "av1"),
    ("libsvtav1", "av1"),
    ("svt-av1", "av1"),
    ("av01", "av1"),
    ("mp4a", "aac"),
    ("libopus", "opus"),
    ("libmp3lame", "mp3"),
    ("a52", "ac3"),
    ("ec3", "eac3"),
    ("vtt", "webvtt"),
    ("wvtt", "webvtt"),
    ("subrip", "srt"),
    ("tx3g", "mov_text"),
    ("ssa", "ass"),
];

const CONTAINERS: &[ContainerDescriptor] = &[
    ContainerDescriptor {
        name: "mp4",
        display_name: "MPEG-4 Part 14",
        extension: "mp4",
        muxer: "mp4",
        can_mux: true,
        can_demux: true,
        segmented: false,
        video_codecs: &["h264", "h265", "av1", "vp9"],
        audio_codecs: &["aac", "mp3", "ac3", "eac3", "opus", "flac"],
        subtitle_codecs: &["mov_text"],
    },
    ContainerDescriptor {
        name: "mkv",
        display_name: "Matroska",
        extension: "mkv",
        muxer: "matroska",
        can_mux: true,
        can_demux: true,
        segmented: false,
        video_codecs: &["h264", "h265", "vp9", "av1"],
        audio_codecs: &["aac", "opus", "mp3", "ac3", "eac3", "flac"],
        subtitle_codecs: &["srt", "ass", "webvtt"],
    },
    ContainerDescriptor {
        name: "webm",
        display_name: "WebM",
        extension: "webm",
        muxer: "webm",
        can_mux: true,
        can_demux: true,
        segmented: false,
        video_codecs: &["vp9", "av1"],
        audio_codecs: &["opus"],
        subtitle_codecs: &["webvtt"],
    },
    ContainerDescriptor {
        name: "mov",
        display_name: "QuickTime",
        extension: "mov",
        muxer: "mov",
        can_mux: true,
        can_demux: true,
        segmented: false,
        video_codecs: &["h264", "h265"],
        audio_codecs: &["aac", "mp3", "flac"],
        subtitle_codecs: &["mov_text"],
    },
    ContainerDescriptor {
        name: "mpegts",
        display_name: "MPEG Transport Stream",
        extension: "ts",
        muxer: "mpegts",
        can_mux: true,
        can_demux: true,
        segmented: false,
        video_codecs: &["h264", "h265"],
        audio_codecs: &["aac", "mp3", "ac3", "eac3"],
        subtitle_codecs: &[],
    },
    ContainerDescriptor {
        name: "hls",
        display_name: "HTTP Live Streaming",
        extension: "m3u8",
        muxer: "hls",
        can_mux: true,
        can_demux: true,
        segmented: true,
        video_codecs: &["h264", "h265"],
        audio_codecs: &["aac", "mp3", "ac3", "eac3"],
        subtitle_codecs: &["webvtt"],
    },
];

const CONTAINER_ALIASES: &[(&str, &str)] = &[
    ("matroska", "mkv"),
    ("m4v", "mp4"),
    ("quicktime", "mov"),
    ("ts", "mpegts"),
    ("m2ts", "mpegts"),
    ("m3u8", "hls"),
];

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Canonical software codec name for `name`, if it is a known software alias.
pub fn canonical_codec_name(name: &str) -> Option<&'static str> {
    let key = normalize(name);
    if let Some(spec) = SOFTWARE_CODECS.iter().find(|s| s.name == key) {
        return Some(spec.name);
    }
    CODEC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
}

/// Looks up a codec by canonical name, alias or hardware encoder id.
///
/// Returns `None` for unknown names.
pub fn lookup_codec(name: &str) -> Option<CodecDescriptor> {
    if let Some(canonical) = canonical_codec_name(name) {
        return SOFTWARE_CODECS
            .iter()
            .find(|s| s.name == canonical)
            .map(|s| CodecDescriptor::from_spec(*s));
    }
    let key = normalize(name);
    HARDWARE_CODECS
        .iter()
        .find(|s| s.name == key)
        .map(|s| CodecDescriptor::from_spec(*s))
}

/// The canonical software encoder for a family.
pub fn software_codec(family: CodecFamily) -> CodecDescriptor {
    let name = family.canonical_name();
    let found = SOFTWARE_CODECS
        .iter()
        .find(|s| s.family == family)
        .copied()
        .unwrap_or_else(|| spec(name, name, name, family));
    CodecDescriptor::from_spec(found)
}

/// The hardware encoder for a family on an accelerator, if one exists.
pub fn hardware_codec(family: CodecFamily, accel: AcceleratorFamily) -> Option<CodecDescriptor> {
    HARDWARE_CODECS
        .iter()
        .find(|s| s.family == family && s.hardware == Some(accel))
        .map(|s| CodecDescriptor::from_spec(*s))
}

/// Looks up a container by name or alias.
pub fn lookup_container(name: &str) -> Option<ContainerDescriptor> {
    let key = normalize(name);
    let canonical = CONTAINER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(key.as_str());
    CONTAINERS.iter().find(|c| c.name == canonical).cloned()
}

/// Every software codec, in catalog order.
pub fn software_codecs() -> Vec<CodecDescriptor> {
    SOFTWARE_CODECS.iter().map(|s| CodecDescriptor::from_spec(*s)).collect()
}

/// Every hardware codec, in catalog order.
pub fn hardware_codecs() -> Vec<CodecDescriptor> {
    HARDWARE_CODECS.iter().map(|s| CodecDescriptor::from_spec(*s)).collect()
}

/// Every container.
pub fn containers() -> Vec<ContainerDescriptor> {
    CONTAINERS.to_vec()
}
