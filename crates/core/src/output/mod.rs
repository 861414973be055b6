//! Output assembly and structural validation.
//!
//! For segmented containers the orchestrator reads back every media
//! playlist, checks segments and durations, checks the bandwidth ladder
//! and codec tags, and only then writes the master playlist.

mod config;
mod error;
mod manifest;
mod orchestrator;
mod validator;

pub use config::OutputConfig;
pub use error::OutputError;
pub use manifest::{
    parse_master_playlist, parse_media_playlist, AlternateMedia, MasterPlaylist, MediaPlaylist,
    MediaType, Segment, Variant,
};
pub use orchestrator::OutputOrchestrator;
pub use validator::{check_bandwidth_ladder, check_codec_tags, check_media_playlist, check_segment_durations};
