//! Codec and container capability model.
//!
//! Descriptors are obtained only through the [`factory`] lookups, which map
//! a name or alias onto one canonical identity:
//!
//! ```ignore
//! use encodefleet_core::capability::{lookup_codec, QualityTier};
//!
//! let mut codec = lookup_codec("hevc").expect("known codec");
//! assert_eq!(codec.name(), "h265");
//! codec.apply_quality_tier(QualityTier::Quality);
//! let args = codec.args(); // -c:v libx265 -preset slow -crf 20
//! ```

mod codec;
mod container;
mod discovery;
mod error;
mod factory;
mod options;
mod types;

pub use codec::{CodecDescriptor, CodecSettings, QualityControl};
pub use container::ContainerDescriptor;
pub use discovery::{CapabilityEntry, CapabilityReport};
pub use error::CapabilityError;
pub use factory::{
    canonical_codec_name, containers, hardware_codec, hardware_codecs, lookup_codec,
    lookup_container, software_codec, software_codecs,
};
pub use options::{OptionKind, OptionMap, OptionSchema, OptionValue};
pub use types::{preset_rank, AcceleratorFamily, CodecFamily, QualityTier, TrackKind, PRESET_SCALE};
