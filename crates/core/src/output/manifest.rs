//! Minimal HLS playlist model: enough to write a master playlist and to
//! read back media playlists for validation.

use std::collections::HashMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub uri: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaPlaylist {
    pub target_duration: Option<u64>,
    pub segments: Vec<Segment>,
    /// `#EXT-X-ENDLIST` present.
    pub ended: bool,
}

impl MediaPlaylist {
    /// VOD playlist wrapping a single file, used for sidecar subtitles.
    pub fn single(uri: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            target_duration: Some(duration_secs.ceil().max(1.0) as u64),
            segments: vec![Segment {
                uri: uri.into(),
                duration_secs,
            }],
            ended: true,
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }

    pub fn render(&self) -> String {
        let target = self.target_duration.unwrap_or_else(|| {
            self.segments
                .iter()
                .map(|s| s.duration_secs.ceil() as u64)
                .max()
                .unwrap_or(0)
        });
        let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", target);
        out.push_str("#EXT-X-PLAYLIST-TYPE:VOD\n#EXT-X-MEDIA-SEQUENCE:0\n");
        for segment in &self.segments {
            let _ = writeln!(out, "#EXTINF:{:.3},", segment.duration_secs);
            let _ = writeln!(out, "{}", segment.uri);
        }
        if self.ended {
            out.push_str("#EXT-X-ENDLIST\n");
        }
        out
    }
}

pub fn parse_media_playlist(text: &str) -> Result<MediaPlaylist, String> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err("missing #EXTM3U header".to_string());
    }

    let mut playlist = MediaPlaylist::default();
    let mut pending: Option<f64> = None;
    for line in lines {
        if let Some(value) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            let target = value
                .parse::<u64>()
                .map_err(|_| format!("invalid target duration '{}'", value))?;
            playlist.target_duration = Some(target);
        } else if let Some(value) = line.strip_prefix("#EXTINF:") {
            let duration = value.split(',').next().unwrap_or_default();
            let duration = duration
                .parse::<f64>()
                .map_err(|_| format!("invalid segment duration '{}'", duration))?;
            pending = Some(duration);
        } else if line == "#EXT-X-ENDLIST" {
            playlist.ended = true;
        } else if line.starts_with('#') {
            continue;
        } else {
            let duration_secs = pending
                .take()
                .ok_or_else(|| format!("segment '{}' has no #EXTINF", line))?;
            playlist.segments.push(Segment {
                uri: line.to_string(),
                duration_secs,
            });
        }
    }
    if pending.is_some() {
        return Err("#EXTINF without segment URI".to_string());
    }
    Ok(playlist)
}

/// One `#EXT-X-STREAM-INF` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub uri: String,
    pub bandwidth: u64,
    pub resolution: Option<(u32, u32)>,
    pub frame_rate: Option<f64>,
    pub codecs: Option<String>,
    pub audio_group: Option<String>,
    pub subtitle_group: Option<String>,
}

impl Variant {
    pub fn pixel_count(&self) -> u64 {
        self.resolution.map_or(0, |(w, h)| w as u64 * h as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Audio,
    Subtitles,
}

impl MediaType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "AUDIO",
            Self::Subtitles => "SUBTITLES",
        }
    }
}

/// One `#EXT-X-MEDIA` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateMedia {
    pub media_type: MediaType,
    pub group_id: String,
    pub name: String,
    pub language: Option<String>,
    pub uri: String,
    pub default: bool,
    /// Not rendered; HLS carries codecs on the variant.
    pub codecs: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MasterPlaylist {
    pub media: Vec<AlternateMedia>,
    pub variants: Vec<Variant>,
}

impl MasterPlaylist {
    pub fn render(&self) -> String {
        let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-INDEPENDENT-SEGMENTS\n");
        for media in &self.media {
            let _ = write!(
                out,
                "#EXT-X-MEDIA:TYPE={},GROUP-ID=\"{}\",NAME=\"{}\"",
                media.media_type.as_str(),
                media.group_id,
                media.name
            );
            if let Some(ref lang) = media.language {
                let _ = write!(out, ",LANGUAGE=\"{}\"", lang);
            }
            let _ = writeln!(
                out,
                ",DEFAULT={},AUTOSELECT=YES,URI=\"{}\"",
                if media.default { "YES" } else { "NO" },
                media.uri
            );
        }
        for variant in &self.variants {
            let _ = write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth);
            if let Some((w, h)) = variant.resolution {
                let _ = write!(out, ",RESOLUTION={}x{}", w, h);
            }
            if let Some(fps) = variant.frame_rate {
                let _ = write!(out, ",FRAME-RATE={:.3}", fps);
            }
            if let Some(ref codecs) = variant.codecs {
                let _ = write!(out, ",CODECS=\"{}\"", codecs);
            }
            if let Some(ref group) = variant.audio_group {
                let _ = write!(out, ",AUDIO=\"{}\"", group);
            }
            if let Some(ref group) = variant.subtitle_group {
                let _ = write!(out, ",SUBTITLES=\"{}\"", group);
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", variant.uri);
        }
        out
    }
}

pub fn parse_master_playlist(text: &str) -> Result<MasterPlaylist, String> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.next() != Some("#EXTM3U") {
        return Err("missing #EXTM3U header".to_string());
    }

    let mut master = MasterPlaylist::default();
    let mut pending: Option<HashMap<String, String>> = None;
    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending = Some(parse_attributes(attrs));
        } else if let Some(attrs) = line.strip_prefix("#EXT-X-MEDIA:") {
            let attrs = parse_attributes(attrs);
            let media_type = match attrs.get("TYPE").map(String::as_str) {
                Some("AUDIO") => MediaType::Audio,
                Some("SUBTITLES") => MediaType::Subtitles,
                other => return Err(format!("unsupported media type {:?}", other)),
            };
            master.media.push(AlternateMedia {
                media_type,
                group_id: attrs.get("GROUP-ID").cloned().unwrap_or_default(),
                name: attrs.get("NAME").cloned().unwrap_or_default(),
                language: attrs.get("LANGUAGE").cloned(),
                uri: attrs
                    .get("URI")
                    .cloned()
                    .ok_or_else(|| "#EXT-X-MEDIA without URI".to_string())?,
                default: attrs.get("DEFAULT").is_some_and(|v| v == "YES"),
                codecs: None,
            });
        } else if line.starts_with('#') {
            continue;
        } else if let Some(attrs) = pending.take() {
            let bandwidth = attrs
                .get("BANDWIDTH")
                .and_then(|b| b.parse().ok())
                .ok_or_else(|| format!("variant '{}' has no valid BANDWIDTH", line))?;
            let resolution = attrs.get("RESOLUTION").and_then(|r| {
                let (w, h) = r.split_once('x')?;
                Some((w.parse().ok()?, h.parse().ok()?))
            });
            master.variants.push(Variant {
                uri: line.to_string(),
                bandwidth,
                resolution,
                frame_rate: attrs.get("FRAME-RATE").and_then(|f| f.parse().ok()),
                codecs: attrs.get("CODECS").cloned(),
                audio_group: attrs.get("AUDIO").cloned(),
                subtitle_group: attrs.get("SUBTITLES").cloned(),
            });
        }
    }
    Ok(master)
}

/// Splits an attribute list, honouring quoted values that contain commas.
fn parse_attributes(input: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let mut rest = input;
    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], quoted[end + 1..].trim_start_matches(',')),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end + 1..]),
                None => (after, ""),
            }
        };
        attrs.insert(key.trim().to_string(), value.to_string());
        rest = remaining;
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXTINF:6.006000,
segment_00000.ts
#EXTINF:6.006000,
segment_00001.ts
#EXTINF:2.502500,
segment_00002.ts
#EXT-X-ENDLIST
";

    #[test]
    fn test_parse_media_playlist() {
        let playlist = parse_media_playlist(MEDIA).unwrap();
        assert_eq!(playlist.target_duration, Some(6));
        assert_eq!(playlist.segments.len(), 3);
        assert_eq!(playlist.segments[2].uri, "segment_00002.ts");
        assert!((playlist.total_duration() - 14.5145).abs() < 1e-9);
        assert!(playlist.ended);
    }

    #[test]
    fn test_parse_media_playlist_errors() {
        assert!(parse_media_playlist("segment.ts").is_err());
        assert!(parse_media_playlist("#EXTM3U\nsegment.ts\n").is_err());
        assert!(parse_media_playlist("#EXTM3U\n#EXTINF:abc,\nsegment.ts\n").is_err());
        assert!(parse_media_playlist("#EXTM3U\n#EXTINF:6.0,\n").is_err());
    }

    #[test]
    fn test_single_segment_playlist() {
        let text = MediaPlaylist::single("sub_1.vtt", 90.5).render();
        assert!(text.contains("#EXT-X-TARGETDURATION:91"));
        assert!(text.contains("#EXTINF:90.500,\nsub_1.vtt"));
        let back = parse_media_playlist(&text).unwrap();
        assert_eq!(back.segments.len(), 1);
    }

    #[test]
    fn test_master_render_and_parse() {
        let master = MasterPlaylist {
            media: vec![AlternateMedia {
                media_type: MediaType::Audio,
                group_id: "audio".to_string(),
                name: "eng".to_string(),
                language: Some("eng".to_string()),
                uri: "audio_1/index.m3u8".to_string(),
                default: true,
                codecs: Some("mp4a.40.2".to_string()),
            }],
            variants: vec![Variant {
                uri: "720p/index.m3u8".to_string(),
                bandwidth: 3_128_000,
                resolution: Some((1280, 720)),
                frame_rate: Some(23.976),
                codecs: Some("avc1.640028,mp4a.40.2".to_string()),
                audio_group: Some("audio".to_string()),
                subtitle_group: None,
            }],
        };
        let text = master.render();
        assert!(text.contains("CODECS=\"avc1.640028,mp4a.40.2\""));

        let parsed = parse_master_playlist(&text).unwrap();
        assert_eq!(parsed.variants.len(), 1);
        let v = &parsed.variants[0];
        assert_eq!(v.bandwidth, 3_128_000);
        assert_eq!(v.resolution, Some((1280, 720)));
        assert_eq!(v.codecs.as_deref(), Some("avc1.640028,mp4a.40.2"));
        assert_eq!(v.audio_group.as_deref(), Some("audio"));
        assert_eq!(parsed.media[0].uri, "audio_1/index.m3u8");
        assert!(parsed.media[0].default);
    }

    #[test]
    fn test_parse_attributes() {
        let attrs = parse_attributes("BANDWIDTH=100,CODECS=\"a,b\",RESOLUTION=2x2");
        assert_eq!(attrs["BANDWIDTH"], "100");
        assert_eq!(attrs["CODECS"], "a,b");
        assert_eq!(attrs["RESOLUTION"], "2x2");
    }
}
