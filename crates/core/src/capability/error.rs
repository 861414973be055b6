//! Error types for capability lookup.

use thiserror::Error;

use super::types::TrackKind;

/// Errors raised when a name does not map to a known descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Unknown codec: {name}")]
    UnknownCodec { name: String },

    #[error("Unknown container: {name}")]
    UnknownContainer { name: String },

    #[error("Codec {codec} is a {actual} codec, expected {expected}")]
    WrongTrack {
        codec: String,
        expected: TrackKind,
        actual: TrackKind,
    },
}

impl CapabilityError {
    pub fn unknown_codec(name: impl Into<String>) -> Self {
        Self::UnknownCodec { name: name.into() }
    }

    pub fn unknown_container(name: impl Into<String>) -> Self {
        Self::UnknownContainer { name: name.into() }
    }
}
