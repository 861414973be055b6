//! Encoding profiles and their resolution into encode plans.
//!
//! A profile names a container and per-track codec settings. The
//! [`ProfileResolver`] combines it with the hardware inventory: codec ids
//! pass through the accelerator service, descriptors are cloned and
//! configured per job, and every violation is reported at once.

mod error;
mod repository;
mod resolver;
mod types;
mod validation;

pub use error::ProfileError;
pub use repository::{InMemoryProfileRepository, ProfileRepository};
pub use resolver::{AudioPlan, EncodePlan, PlanSummary, ProfileResolver, SubtitlePlan, VideoPlan};
pub use types::{
    AudioConfig, EncodingProfile, ProfilePurpose, ProfileRequest, Rendition, SubtitleConfig,
    VideoConfig,
};
pub use validation::{check_codec, validate_profile};
