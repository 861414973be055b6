//! Validation results shared by descriptors, profiles and the resolver.

use serde::{Deserialize, Serialize};

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The configuration cannot be executed.
    Error,
    /// The configuration runs but something is ignored or suspicious.
    Warning,
    /// Informational note (e.g. a fallback was applied).
    Info,
}

/// A single validation finding, attached to a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Complete validation outcome: every finding, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Builds a report; it is valid when no issue has `Error` severity.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let valid = !issues.iter().any(ValidationIssue::is_error);
        Self { valid, issues }
    }

    /// Issues with `Error` severity.
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    /// Issues reported against one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |i| i.field == field)
    }

    /// One-line summary of the error messages.
    pub fn summary(&self) -> String {
        self.errors()
            .map(|i| format!("{}: {}", i.field, i.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_valid_with_only_warnings() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::warning("video.tune", "ignored"),
            ValidationIssue::info("video.preset", "fell back to slow"),
        ]);
        assert!(report.valid);
        assert_eq!(report.errors().count(), 0);
    }

    #[test]
    fn test_report_invalid_with_error() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::error("video.codec", "not supported by webm"),
            ValidationIssue::error("audio.codec", "unknown codec 'foo'"),
        ]);
        assert!(!report.valid);
        assert_eq!(report.errors().count(), 2);
        assert_eq!(report.for_field("audio.codec").count(), 1);
        assert_eq!(
            report.summary(),
            "video.codec: not supported by webm; audio.codec: unknown codec 'foo'"
        );
    }

    #[test]
    fn test_severity_serialization() {
        let issue = ValidationIssue::error("container", "unknown");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
    }
}
