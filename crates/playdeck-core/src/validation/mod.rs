//! Pre-flight input validation.
//!
//! Every check here is a pure function: no I/O, no network access, and no
//! participation in retry/backoff. Checks never fail by returning `Err`;
//! they return a [`ValidationReport`] listing every violated rule.
//!
//! ## Example
//!
//! ```rust
//! use playdeck_core::validation::{validate_package_name, validate_track};
//!
//! assert!(validate_package_name("com.example.myapp").is_valid());
//! assert!(!validate_track("staging").is_valid());
//! ```

mod rules;

pub use rules::*;

use serde::{Deserialize, Serialize};

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Field that failed (e.g., "package_name", "title").
    pub field: String,
    /// Human-readable description of the violated rule.
    pub message: String,
    /// The offending value, or a description of it.
    pub value: String,
}

impl ValidationIssue {
    /// Creates a new validation issue.
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.value)
    }
}

/// Outcome of one or more checks: `{valid, errors}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether every check passed.
    pub valid: bool,
    /// All violated rules.
    pub errors: Vec<ValidationIssue>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationReport {
    /// Creates a passing report.
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Returns `true` if no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }

    /// Records a violated rule.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.valid = false;
        self.errors.push(issue);
    }

    /// Merges another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        for issue in other.errors {
            self.add(issue);
        }
    }

    /// Turns a failing report into an error, for pre-flight gates.
    pub fn into_result(self) -> crate::error::Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(crate::error::PublishError::Validation(self))
        }
    }

    /// Returns an iterator over all violations.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "valid");
        }
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl<'a> IntoIterator for &'a ValidationReport {
    type Item = &'a ValidationIssue;
    type IntoIter = std::slice::Iter<'a, ValidationIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_starts_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_report_merge() {
        let mut a = ValidationReport::new();
        let mut b = ValidationReport::new();
        b.add(ValidationIssue::new("track", "bad", "staging"));
        a.merge(b);
        assert!(!a.is_valid());
        assert_eq!(a.errors.len(), 1);
        assert!(a.into_result().is_err());
    }

    #[test]
    fn test_report_serializes_valid_and_errors() {
        let mut report = ValidationReport::new();
        report.add(ValidationIssue::new("title", "Title must be 50 characters or less", "51 characters"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["field"], "title");
    }
}
