use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown node: {id}")]
    UnknownNode { id: String },

    #[error("Invalid registration: {reason}")]
    InvalidRegistration { reason: String },
}

impl RegistryError {
    pub fn unknown_node(id: impl Into<String>) -> Self {
        Self::UnknownNode { id: id.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            reason: reason.into(),
        }
    }
}
