//! Error types for profiles.

use thiserror::Error;

use crate::validation::ValidationReport;

#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    /// The profile cannot be executed; the report lists every violation.
    #[error("Profile validation failed: {}", .0.summary())]
    Validation(ValidationReport),

    #[error("Profile not found: {name}")]
    NotFound { name: String },

    #[error("Profile {name} has no version {version}")]
    VersionNotFound { name: String, version: u32 },
}

impl ProfileError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// The validation report, if this is a validation failure.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            _ => None,
        }
    }
}
