//! Package name, track, listing text, rollout, review reply and tester rules.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Track;

use super::{ValidationIssue, ValidationReport};

/// Maximum characters for the app title.
pub const TITLE_MAX: usize = 50;

/// Maximum characters for the short description.
pub const SHORT_DESCRIPTION_MAX: usize = 80;

/// Maximum characters for the full description.
pub const FULL_DESCRIPTION_MAX: usize = 4000;

/// Maximum characters for a reply to a review.
pub const REPLY_MAX: usize = 350;

static PACKAGE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)+$").expect("valid package name regex")
});

static GROUP_EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid group email regex")
});

/// Counts Unicode scalar values, which is how store limits are measured.
pub fn char_count(value: &str) -> usize {
    value.chars().count()
}

/// Validates an application package name (e.g., `com.example.app`).
///
/// Rules: non-empty, at least one dot, every dot-delimited segment starts
/// with a lowercase letter, and only lowercase letters, digits, underscores
/// and dots are allowed.
pub fn validate_package_name(package_name: &str) -> ValidationReport {
    let mut report = ValidationReport::new();

    if package_name.is_empty() {
        report.add(ValidationIssue::new(
            "package_name",
            "Package name cannot be empty",
            package_name,
        ));
        return report;
    }

    if !package_name.contains('.') {
        report.add(ValidationIssue::new(
            "package_name",
            "Package name must contain at least one dot (e.g., com.example.app)",
            package_name,
        ));
    }

    if !PACKAGE_NAME_REGEX.is_match(package_name) {
        report.add(ValidationIssue::new(
            "package_name",
            "Package name must start with lowercase letter and contain only lowercase letters, numbers, underscores, and dots",
            package_name,
        ));
    }

    report
}

/// Validates a track name against the fixed set of tracks.
pub fn validate_track(track: &str) -> ValidationReport {
    let mut report = ValidationReport::new();

    if track.parse::<Track>().is_err() {
        let names: Vec<&str> = Track::ALL.iter().map(Track::as_str).collect();
        report.add(ValidationIssue::new(
            "track",
            format!("Track must be one of: {}", names.join(", ")),
            track,
        ));
    }

    report
}

/// Validates store listing text lengths. Absent fields are not checked.
pub fn validate_listing_text(
    title: Option<&str>,
    short_description: Option<&str>,
    full_description: Option<&str>,
) -> ValidationReport {
    let mut report = ValidationReport::new();

    let fields = [
        ("title", "Title", title, TITLE_MAX),
        (
            "short_description",
            "Short description",
            short_description,
            SHORT_DESCRIPTION_MAX,
        ),
        (
            "full_description",
            "Full description",
            full_description,
            FULL_DESCRIPTION_MAX,
        ),
    ];

    for (field, label, value, max) in fields {
        if let Some(value) = value {
            let count = char_count(value);
            if count > max {
                report.add(ValidationIssue::new(
                    field,
                    format!("{} must be {} characters or less", label, max),
                    format!("{} characters", count),
                ));
            }
        }
    }

    report
}

/// Validates a rollout percentage: accepted iff `0 <= p <= 100`.
pub fn validate_rollout(percentage: f64) -> ValidationReport {
    let mut report = ValidationReport::new();

    if !(0.0..=100.0).contains(&percentage) {
        report.add(ValidationIssue::new(
            "rollout_percentage",
            "Rollout percentage must be between 0 and 100",
            percentage.to_string(),
        ));
    }

    report
}

/// Validates the text of a reply to a review: non-blank and at most
/// [`REPLY_MAX`] characters.
pub fn validate_reply_text(text: &str) -> ValidationReport {
    let mut report = ValidationReport::new();

    if text.trim().is_empty() {
        report.add(ValidationIssue::new(
            "reply_text",
            "Reply text cannot be empty",
            text,
        ));
    }

    let count = char_count(text);
    if count > REPLY_MAX {
        report.add(ValidationIssue::new(
            "reply_text",
            format!("Reply text must be {} characters or less", REPLY_MAX),
            format!("{} characters", count),
        ));
    }

    report
}

/// Validates tester Google Group addresses. An empty list is allowed and
/// clears the testers of a track.
pub fn validate_tester_groups(groups: &[String]) -> ValidationReport {
    let mut report = ValidationReport::new();

    for group in groups {
        if !GROUP_EMAIL_REGEX.is_match(group) {
            report.add(ValidationIssue::new(
                "google_groups",
                "Tester group must be an email address (e.g., testers@googlegroups.com)",
                group.as_str(),
            ));
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_package_names() {
        assert!(validate_package_name("com.example.myapp").is_valid());
        assert!(validate_package_name("com.example_co.app2").is_valid());
        assert!(validate_package_name("a.b").is_valid());
    }

    #[test]
    fn test_uppercase_first_segment_rejected() {
        let report = validate_package_name("Com.example");
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].field, "package_name");
    }

    #[test]
    fn test_package_name_rules() {
        let empty = validate_package_name("");
        assert_eq!(empty.errors.len(), 1);
        assert_eq!(empty.errors[0].message, "Package name cannot be empty");

        // No dot fails both the dot rule and the pattern.
        assert_eq!(validate_package_name("myapp").errors.len(), 2);

        assert!(!validate_package_name("com.1example.app").is_valid());
        assert!(!validate_package_name("com.example-app").is_valid());
        assert!(!validate_package_name("com..example").is_valid());
        assert!(!validate_package_name("com.example.").is_valid());
    }

    #[test]
    fn test_validate_track() {
        for track in ["internal", "alpha", "beta", "production"] {
            assert!(validate_track(track).is_valid());
        }
        let report = validate_track("staging");
        assert!(!report.is_valid());
        assert!(report.errors[0].message.contains("internal, alpha, beta, production"));
    }

    #[test]
    fn test_listing_title_limit() {
        assert!(validate_listing_text(Some(&"x".repeat(50)), None, None).is_valid());

        let report = validate_listing_text(Some(&"x".repeat(51)), None, None);
        assert!(!report.is_valid());
        assert_eq!(report.errors[0].field, "title");
        assert_eq!(report.errors[0].value, "51 characters");
    }

    #[test]
    fn test_listing_all_fields() {
        let report = validate_listing_text(
            Some(&"t".repeat(51)),
            Some(&"s".repeat(81)),
            Some(&"f".repeat(4001)),
        );
        assert_eq!(report.errors.len(), 3);

        assert!(validate_listing_text(None, None, None).is_valid());
        assert!(validate_listing_text(None, Some(&"s".repeat(80)), Some(&"f".repeat(4000))).is_valid());
    }

    #[test]
    fn test_listing_counts_characters_not_bytes() {
        // 50 multi-byte characters are still within the title limit.
        assert!(validate_listing_text(Some(&"é".repeat(50)), None, None).is_valid());
    }

    #[test]
    fn test_validate_rollout() {
        for p in [0.0, 0.1, 20.0, 99.9, 100.0] {
            assert!(validate_rollout(p).is_valid(), "{} should be accepted", p);
        }
        for p in [-1.0, -0.0001, 100.0001, 250.0, f64::NAN, f64::INFINITY] {
            assert!(!validate_rollout(p).is_valid(), "{} should be rejected", p);
        }
    }

    #[test]
    fn test_validate_reply_text() {
        assert!(validate_reply_text("Thanks, fixed in 1.2").is_valid());
        assert!(validate_reply_text(&"r".repeat(350)).is_valid());
        assert!(!validate_reply_text("   ").is_valid());

        let report = validate_reply_text(&"r".repeat(351));
        assert_eq!(report.errors[0].field, "reply_text");
        assert_eq!(report.errors[0].value, "351 characters");
    }

    #[test]
    fn test_validate_tester_groups() {
        assert!(validate_tester_groups(&[]).is_valid());
        assert!(validate_tester_groups(&["beta@googlegroups.com".to_string()]).is_valid());

        let report = validate_tester_groups(&[
            "beta@googlegroups.com".to_string(),
            "not an address".to_string(),
            "a@b".to_string(),
        ]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].value, "not an address");
    }
}
