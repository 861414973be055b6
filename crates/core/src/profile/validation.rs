//! Structural profile checks that do not depend on the hardware inventory.

use std::collections::HashSet;

use super::types::EncodingProfile;
use crate::capability::{lookup_codec, CodecDescriptor, ContainerDescriptor, OptionMap, TrackKind};
use crate::command::parse_option_args;
use crate::validation::ValidationIssue;

/// Checks names, dimensions, ladders and free-form arguments.
///
/// Codec checks live in [`check_codec`] so the resolver reports each codec
/// field once.
pub fn validate_profile(profile: &EncodingProfile, container: Option<&ContainerDescriptor>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if profile.name.trim().is_empty() {
        issues.push(ValidationIssue::error("name", "profile name cannot be empty"));
    }

    match container {
        None => issues.push(ValidationIssue::error(
            "container",
            format!("unknown container '{}'", profile.container),
        )),
        Some(c) if !c.can_mux() => issues.push(ValidationIssue::error(
            "container",
            format!("container '{}' cannot be written", c.name()),
        )),
        Some(_) => {}
    }

    let video = &profile.video;
    if video.height == 0 {
        issues.push(ValidationIssue::error("video.height", "height must be greater than zero"));
    }
    if video.width == Some(0) {
        issues.push(ValidationIssue::error("video.width", "width must be greater than zero"));
    }
    if let Some(fps) = video.framerate {
        if !(fps > 0.0 && fps <= 240.0) {
            issues.push(ValidationIssue::error(
                "video.framerate",
                format!("framerate {} is outside 0..=240", fps),
            ));
        }
    }

    let mut names = HashSet::new();
    for (i, rendition) in video.renditions.iter().enumerate() {
        let field = format!("video.renditions[{}]", i);
        if rendition.name.trim().is_empty() {
            issues.push(ValidationIssue::error(format!("{}.name", field), "rendition name cannot be empty"));
        } else if !names.insert(rendition.name.as_str()) {
            issues.push(ValidationIssue::error(
                format!("{}.name", field),
                format!("duplicate rendition name '{}'", rendition.name),
            ));
        }
        if rendition.height == 0 {
            issues.push(ValidationIssue::error(format!("{}.height", field), "height must be greater than zero"));
        }
        if rendition.bitrate_kbps == 0 {
            issues.push(ValidationIssue::error(format!("{}.bitrate", field), "bitrate must be greater than zero"));
        }
        if rendition.max_bitrate_kbps.is_some_and(|max| max < rendition.bitrate_kbps) {
            issues.push(ValidationIssue::error(
                format!("{}.max_bitrate", field),
                "max bitrate is below target bitrate",
            ));
        }
    }

    if profile.audio.channels > 8 {
        issues.push(ValidationIssue::error(
            "audio.channels",
            format!("{} channels exceeds the maximum of 8", profile.audio.channels),
        ));
    }

    issues
}

/// Resolves `name` for a track and checks it against the container.
///
/// Produces at most one issue, always on `field`.
pub fn check_codec(
    field: &str,
    name: &str,
    track: TrackKind,
    container: Option<&ContainerDescriptor>,
) -> Result<CodecDescriptor, ValidationIssue> {
    let codec = lookup_codec(name)
        .ok_or_else(|| ValidationIssue::error(field, format!("unknown codec '{}'", name)))?;

    if codec.track() != track {
        return Err(ValidationIssue::error(
            field,
            format!("'{}' is a {} codec, expected {}", name, codec.track(), track),
        ));
    }

    if let Some(container) = container {
        let family = codec.family().canonical_name();
        if !container.supports(track, family) {
            return Err(ValidationIssue::error(
                field,
                format!(
                    "container '{}' does not support {} codec '{}' (supported: {})",
                    container.name(),
                    track,
                    family,
                    container.supported_codecs(track).join(", ")
                ),
            ));
        }
    }

    Ok(codec)
}

/// Merges a track's custom option map and argument string.
pub fn extra_options(
    field: &str,
    custom_options: &OptionMap,
    custom_args: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> OptionMap {
    let mut extra = custom_options.clone();
    if let Some(args) = custom_args {
        match parse_option_args(args) {
            Ok(parsed) => extra.extend(&parsed),
            Err(e) => issues.push(ValidationIssue::error(format!("{}.custom_args", field), e.to_string())),
        }
    }
    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::lookup_container;
    use crate::profile::types::Rendition;

    #[test]
    fn test_default_profile_is_clean() {
        let profile = EncodingProfile::new("default");
        let container = lookup_container(&profile.container);
        assert!(validate_profile(&profile, container.as_ref()).is_empty());
    }

    #[test]
    fn test_collects_every_issue() {
        let mut profile = EncodingProfile::new("");
        profile.container = "flv9".to_string();
        profile.video.height = 0;
        profile.video.framerate = Some(-1.0);
        profile.video.renditions = vec![
            Rendition::new("hd", 720, 3000),
            Rendition::new("hd", 0, 0),
        ];
        let issues = validate_profile(&profile, None);
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        for expected in [
            "name",
            "container",
            "video.height",
            "video.framerate",
            "video.renditions[1].name",
            "video.renditions[1].height",
            "video.renditions[1].bitrate",
        ] {
            assert!(fields.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_container_mismatch_is_one_error_on_field() {
        let webm = lookup_container("webm");
        let issue = check_codec("video.codec", "h264", TrackKind::Video, webm.as_ref()).unwrap_err();
        assert_eq!(issue.field, "video.codec");
        assert!(issue.is_error());
        assert!(issue.message.contains("webm"));
    }

    #[test]
    fn test_wrong_track() {
        let issue = check_codec("audio.codec", "hevc", TrackKind::Audio, None).unwrap_err();
        assert!(issue.message.contains("video codec"));
    }

    #[test]
    fn test_extra_options_merge() {
        let mut issues = Vec::new();
        let custom = OptionMap::new().with("-tag:v", "avc1");
        let extra = extra_options("video", &custom, Some("-tag:v hvc1 -bf 2"), &mut issues);
        assert!(issues.is_empty());
        assert_eq!(extra.get_str("-tag:v"), Some("hvc1"));
        assert_eq!(extra.get_str("-bf"), Some("2"));

        extra_options("audio", &OptionMap::new(), Some("oops"), &mut issues);
        assert_eq!(issues[0].field, "audio.custom_args");
    }

    #[test]
    fn test_unterminated_quote_in_custom_args() {
        let mut issues = Vec::new();
        let extra = extra_options(
            "video",
            &OptionMap::new(),
            Some(r#"-metadata "title=oops -c:v libx264"#),
            &mut issues,
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "video.custom_args");
        assert!(issues[0].is_error());
        assert!(!extra.contains_key("-metadata"));
    }
}
