use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("Input has no stream the profile can encode: {path}")]
    NothingToEncode { path: String },
}
