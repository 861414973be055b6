//! Capability discovery report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::codec::CodecDescriptor;
use super::container::ContainerDescriptor;
use super::factory::{containers, hardware_codecs, software_codecs};
use super::options::OptionSchema;
use super::types::{AcceleratorFamily, TrackKind};

/// One encoder or container in a capability report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub name: String,
    pub display_name: String,
    pub hardware: bool,
    pub options: Vec<OptionSchema>,
}

impl From<&CodecDescriptor> for CapabilityEntry {
    fn from(codec: &CodecDescriptor) -> Self {
        Self {
            name: codec.name().to_string(),
            display_name: codec.display_name().to_string(),
            hardware: codec.is_hardware(),
            options: codec.option_schema(),
        }
    }
}

impl From<&ContainerDescriptor> for CapabilityEntry {
    fn from(container: &ContainerDescriptor) -> Self {
        Self {
            name: container.name().to_string(),
            display_name: container.display_name().to_string(),
            hardware: false,
            options: container.option_schema(),
        }
    }
}

/// What this installation can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    pub video_encoders: Vec<CapabilityEntry>,
    pub audio_encoders: Vec<CapabilityEntry>,
    pub subtitle_encoders: Vec<CapabilityEntry>,
    pub containers: Vec<CapabilityEntry>,
    pub generated_at: DateTime<Utc>,
}

impl CapabilityReport {
    /// Builds a report listing every software encoder plus the hardware
    /// encoders of the given accelerator families.
    pub fn build(accelerators: &[AcceleratorFamily]) -> Self {
        let mut report = Self {
            video_encoders: Vec::new(),
            audio_encoders: Vec::new(),
            subtitle_encoders: Vec::new(),
            containers: containers().iter().map(CapabilityEntry::from).collect(),
            generated_at: Utc::now(),
        };

        let hardware = hardware_codecs()
            .into_iter()
            .filter(|c| c.accelerator().is_some_and(|a| accelerators.contains(&a)));

        for codec in software_codecs().into_iter().chain(hardware) {
            let entry = CapabilityEntry::from(&codec);
            match codec.track() {
                TrackKind::Video => report.video_encoders.push(entry),
                TrackKind::Audio => report.audio_encoders.push(entry),
                TrackKind::Subtitle => report.subtitle_encoders.push(entry),
            }
        }

        report
    }
}
