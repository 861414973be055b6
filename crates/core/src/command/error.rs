use thiserror::Error;

/// Errors from parsing a free-form argument string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Malformed argument string: {reason}")]
    Malformed { reason: String },

    #[error("Value '{value}' has no preceding flag")]
    DanglingValue { value: String },
}

impl From<shell_words::ParseError> for CommandError {
    fn from(e: shell_words::ParseError) -> Self {
        Self::Malformed { reason: e.to_string() }
    }
}
