//! Structural checks on assembled output.

use std::path::Path;

use super::error::OutputError;
use super::manifest::{parse_media_playlist, AlternateMedia, MediaPlaylist, Variant};

/// Reads a media playlist and checks it against the segment layout.
///
/// Every referenced segment must exist. Each segment but the last must be
/// within `tolerance` of `target`; the last may be shorter but not longer
/// than `target + tolerance`.
pub async fn check_media_playlist(
    playlist_path: &Path,
    target: f64,
    tolerance: f64,
) -> Result<Vec<String>, OutputError> {
    let text = tokio::fs::read_to_string(playlist_path)
        .await
        .map_err(|e| OutputError::PlaylistUnreadable {
            path: playlist_path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let playlist = parse_media_playlist(&text).map_err(|reason| OutputError::PlaylistUnreadable {
        path: playlist_path.to_path_buf(),
        reason,
    })?;

    let label = playlist_path.display().to_string();
    let mut violations = check_segment_durations(&label, &playlist, target, tolerance);

    let dir = playlist_path.parent().unwrap_or(Path::new("."));
    for segment in &playlist.segments {
        let path = dir.join(&segment.uri);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            violations.push(format!("{}: segment {} is missing", label, segment.uri));
        }
    }
    Ok(violations)
}

pub fn check_segment_durations(label: &str, playlist: &MediaPlaylist, target: f64, tolerance: f64) -> Vec<String> {
    let mut violations = Vec::new();
    let Some((last, rest)) = playlist.segments.split_last() else {
        violations.push(format!("{}: playlist has no segments", label));
        return violations;
    };
    for segment in rest {
        if (segment.duration_secs - target).abs() > tolerance {
            violations.push(format!(
                "{}: segment {} lasts {:.3}s, expected {:.3}s ± {:.3}s",
                label, segment.uri, segment.duration_secs, target, tolerance
            ));
        }
    }
    if last.duration_secs > target + tolerance {
        violations.push(format!(
            "{}: final segment {} lasts {:.3}s, longer than {:.3}s",
            label,
            last.uri,
            last.duration_secs,
            target + tolerance
        ));
    }
    violations
}

/// Bandwidth must rise strictly with resolution across video variants.
pub fn check_bandwidth_ladder(variants: &[Variant]) -> Vec<String> {
    let mut sorted: Vec<&Variant> = variants.iter().collect();
    sorted.sort_by_key(|v| (v.pixel_count(), v.bandwidth));
    sorted
        .windows(2)
        .filter(|pair| pair[1].pixel_count() > pair[0].pixel_count() && pair[1].bandwidth <= pair[0].bandwidth)
        .map(|pair| {
            format!(
                "variant {} ({} bps) is larger than {} but not higher bandwidth ({} bps)",
                pair[1].uri, pair[1].bandwidth, pair[0].uri, pair[0].bandwidth
            )
        })
        .collect()
}

/// Every declared stream needs a codec tag.
pub fn check_codec_tags(variants: &[Variant], media: &[AlternateMedia]) -> Vec<String> {
    let variants = variants
        .iter()
        .filter(|v| v.codecs.as_deref().is_none_or(str::is_empty))
        .map(|v| format!("variant {} has no codec tag", v.uri));
    let media = media
        .iter()
        .filter(|m| m.codecs.as_deref().is_none_or(str::is_empty))
        .map(|m| format!("media {} has no codec tag", m.uri));
    variants.chain(media).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::manifest::{MediaType, Segment};

    fn variant(uri: &str, w: u32, h: u32, bandwidth: u64) -> Variant {
        Variant {
            uri: uri.to_string(),
            bandwidth,
            resolution: Some((w, h)),
            frame_rate: None,
            codecs: Some("avc1.640028".to_string()),
            audio_group: None,
            subtitle_group: None,
        }
    }

    fn playlist(durations: &[f64]) -> MediaPlaylist {
        MediaPlaylist {
            target_duration: Some(6),
            segments: durations
                .iter()
                .enumerate()
                .map(|(i, d)| Segment {
                    uri: format!("segment_{:05}.ts", i),
                    duration_secs: *d,
                })
                .collect(),
            ended: true,
        }
    }

    #[test]
    fn test_segment_durations() {
        assert!(check_segment_durations("p", &playlist(&[6.0, 6.5, 2.0]), 6.0, 1.0).is_empty());
        assert_eq!(check_segment_durations("p", &playlist(&[6.0, 3.0, 2.0]), 6.0, 1.0).len(), 1);
        assert_eq!(check_segment_durations("p", &playlist(&[6.0, 9.0]), 6.0, 1.0).len(), 1);
        assert_eq!(check_segment_durations("p", &playlist(&[]), 6.0, 1.0).len(), 1);
    }

    #[test]
    fn test_bandwidth_ladder() {
        let ok = [
            variant("1080p", 1920, 1080, 6_000_000),
            variant("480p", 854, 480, 1_200_000),
            variant("720p", 1280, 720, 3_000_000),
        ];
        assert!(check_bandwidth_ladder(&ok).is_empty());

        let inverted = [variant("1080p", 1920, 1080, 2_000_000), variant("720p", 1280, 720, 3_000_000)];
        let violations = check_bandwidth_ladder(&inverted);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("1080p"));
    }

    #[test]
    fn test_codec_tags() {
        let mut untagged = variant("720p", 1280, 720, 1);
        untagged.codecs = None;
        let media = AlternateMedia {
            media_type: MediaType::Subtitles,
            group_id: "subs".to_string(),
            name: "eng".to_string(),
            language: None,
            uri: "subtitles/sub_1.m3u8".to_string(),
            default: false,
            codecs: Some("wvtt".to_string()),
        };
        let violations = check_codec_tags(&[untagged], &[media]);
        assert_eq!(violations, vec!["variant 720p has no codec tag".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_segment_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.m3u8");
        tokio::fs::write(&path, playlist(&[6.0, 4.0]).render()).await.unwrap();
        tokio::fs::write(dir.path().join("segment_00000.ts"), b"ts").await.unwrap();

        let violations = check_media_playlist(&path, 6.0, 1.0).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("segment_00001.ts is missing"));
    }

    #[tokio::test]
    async fn test_unreadable_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_media_playlist(&dir.path().join("nope.m3u8"), 6.0, 1.0).await.unwrap_err();
        assert!(matches!(err, OutputError::PlaylistUnreadable { .. }));
    }
}
