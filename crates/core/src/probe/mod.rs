//! Input probing: which streams a source file carries.

mod error;
mod ffprobe;
mod types;

pub use error::ProbeError;
pub use ffprobe::{FfprobeProber, MediaProber};
pub use types::{AudioStream, ProbedInput, SubtitleStream, VideoStream};
