//! Task splitting: one task per rendition and per audio/subtitle stream.

mod error;
mod filters;
mod split;

pub use error::SplitError;
pub use split::{TaskSplitter, MEDIA_PLAYLIST};
