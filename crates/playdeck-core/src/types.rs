//! Core types for playdeck

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FailureDetail, PublishError, Result};
use crate::validation::{validate_rollout, ValidationIssue, ValidationReport};

/// Release track, in promotion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Internal testing
    Internal,
    /// Closed testing
    Alpha,
    /// Open testing
    Beta,
    /// Public release
    Production,
}

impl Track {
    /// All tracks, in promotion order
    pub const ALL: [Track; 4] = [Track::Internal, Track::Alpha, Track::Beta, Track::Production];

    /// Returns the string representation of the track
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "internal" => Ok(Self::Internal),
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "production" => Ok(Self::Production),
            _ => Err(format!("Unknown track: {}", s)),
        }
    }
}

/// Status of a release on a track, as reported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    /// Not yet rolled out
    Draft,
    /// Staged rollout in progress
    InProgress,
    /// Rollout stopped
    Halted,
    /// Fully rolled out
    Completed,
    /// Status the service reported that playdeck does not model
    #[serde(other)]
    Unknown,
}

impl ReleaseStatus {
    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "inProgress",
            Self::Halted => "halted",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }

    /// `Completed` and `Halted` end the life of a version on a track
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Halted)
    }

    /// Halt and rollout changes are only valid during a staged rollout
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rollout percentage in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RolloutPercentage(f64);

impl RolloutPercentage {
    /// Full rollout
    pub const FULL: RolloutPercentage = RolloutPercentage(100.0);

    /// Create a validated rollout percentage
    pub fn new(percentage: f64) -> Result<Self> {
        let report = validate_rollout(percentage);
        if !report.is_valid() {
            return Err(PublishError::Validation(report));
        }
        Ok(Self(percentage))
    }

    /// Percentage value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this is a full (100%) rollout
    pub fn is_full(&self) -> bool {
        self.0 >= 100.0
    }

    /// Fraction of users sent on the wire, `None` for a full rollout
    pub fn user_fraction(&self) -> Option<f64> {
        if self.is_full() {
            None
        } else {
            Some(self.0 / 100.0)
        }
    }

    /// Percentage reported by the service; an absent fraction means 100%
    pub fn from_user_fraction(fraction: Option<f64>) -> f64 {
        fraction.map(|f| f * 100.0).unwrap_or(100.0)
    }
}

impl Default for RolloutPercentage {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<f64> for RolloutPercentage {
    type Error = String;

    fn try_from(value: f64) -> std::result::Result<Self, Self::Error> {
        Self::new(value).map_err(|e| e.to_string())
    }
}

impl From<RolloutPercentage> for f64 {
    fn from(value: RolloutPercentage) -> Self {
        value.0
    }
}

impl std::fmt::Display for RolloutPercentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Release notes keyed by language code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseNotes(BTreeMap<String, String>);

impl ReleaseNotes {
    /// Create empty release notes
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes in a single language
    pub fn single(language: impl Into<String>, text: impl Into<String>) -> Self {
        let mut notes = BTreeMap::new();
        notes.insert(language.into(), text.into());
        Self(notes)
    }

    /// Add or replace the text for a language
    pub fn insert(&mut self, language: impl Into<String>, text: impl Into<String>) {
        self.0.insert(language.into(), text.into());
    }

    /// Text for a language
    pub fn get(&self, language: &str) -> Option<&str> {
        self.0.get(language).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(language, text)` pairs in language order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for ReleaseNotes {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Kind of uploaded binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Android App Bundle (.aab)
    Bundle,
    /// APK
    Apk,
}

impl ArtifactKind {
    /// Determine the kind from a file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "aab" => Self::Bundle,
            _ => Self::Apk,
        }
    }

    /// Content type sent with the upload
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Bundle => "application/octet-stream",
            Self::Apk => "application/vnd.android.package-archive",
        }
    }
}

/// An opaque binary to upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Bundle or APK
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Describe an artifact on disk; a missing file is a validation failure
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            _ => {
                let mut report = ValidationReport::new();
                report.add(ValidationIssue::new(
                    "file_path",
                    format!("File not found: {}", path.display()),
                    path.display().to_string(),
                ));
                return Err(PublishError::Validation(report));
            }
        };

        Ok(Self {
            kind: ArtifactKind::from_path(&path),
            size: metadata.len(),
            path,
        })
    }
}

/// A release of one or more version codes on a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// App package name
    pub package_name: String,
    /// Track the release lives on
    pub track: Track,
    /// Release status
    pub status: ReleaseStatus,
    /// Version codes in the release
    pub version_codes: Vec<i64>,
    /// Version name
    pub name: Option<String>,
    /// Rollout percentage (0-100)
    pub rollout_percentage: f64,
    /// Release notes by language
    pub release_notes: ReleaseNotes,
}

impl Release {
    /// Whether this release contains the given version code
    pub fn contains_version(&self, version_code: i64) -> bool {
        self.version_codes.contains(&version_code)
    }
}

/// Releases read from one track, or the error that prevented reading it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReleases {
    /// Track name
    pub track: Track,
    /// Releases on this track
    pub releases: Vec<Release>,
    /// Read failure for this track only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

impl TrackReleases {
    /// Successful read
    pub fn ok(track: Track, releases: Vec<Release>) -> Self {
        Self {
            track,
            releases,
            error: None,
        }
    }

    /// Failed read
    pub fn failed(track: Track, error: &PublishError) -> Self {
        Self {
            track,
            releases: Vec::new(),
            error: Some(error.to_detail()),
        }
    }

    /// Find the release containing a version code
    pub fn find_version(&self, version_code: i64) -> Option<&Release> {
        self.releases.iter().find(|r| r.contains_version(version_code))
    }
}

/// Result of a state-changing release operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// App package name
    pub package_name: String,
    /// Target track
    pub track: Track,
    /// Version code acted on
    pub version_code: i64,
    /// Status read back from the service after the write
    pub status: ReleaseStatus,
    /// Rollout percentage read back from the service
    pub rollout_percentage: f64,
    /// Edit that carried the change
    pub edit_id: Option<String>,
    /// Status message
    pub message: String,
}

/// Outcome of one track in a batch deploy
#[derive(Debug)]
pub struct TrackOutcome {
    /// Track as requested by the caller
    pub track: String,
    /// Deployment result or the classified failure
    pub result: Result<DeploymentResult>,
}

impl TrackOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if this track failed
    pub fn error(&self) -> Option<&PublishError> {
        self.result.as_ref().err()
    }
}

/// Aggregate of per-track outcomes for a multi-track deploy
#[derive(Debug)]
pub struct BatchDeploymentResult {
    /// App package name
    pub package_name: String,
    /// One outcome per requested track, in request order
    pub outcomes: Vec<TrackOutcome>,
    /// Number of tracks that succeeded
    pub successful_count: usize,
    /// Number of tracks that failed
    pub failed_count: usize,
}

impl BatchDeploymentResult {
    /// Aggregate outcomes, counting successes and failures
    pub fn from_outcomes(package_name: impl Into<String>, outcomes: Vec<TrackOutcome>) -> Self {
        let successful_count = outcomes.iter().filter(|o| o.is_success()).count();
        let failed_count = outcomes.len() - successful_count;
        Self {
            package_name: package_name.into(),
            outcomes,
            successful_count,
            failed_count,
        }
    }

    /// Whether every track succeeded
    pub fn success(&self) -> bool {
        self.failed_count == 0
    }

    /// Outcome for a requested track
    pub fn outcome(&self, track: &str) -> Option<&TrackOutcome> {
        self.outcomes.iter().find(|o| o.track == track)
    }

    /// Human-readable summary line
    pub fn message(&self) -> String {
        let mut message = format!(
            "Deployed to {}/{} tracks successfully",
            self.successful_count,
            self.outcomes.len()
        );
        if self.failed_count > 0 {
            message.push_str(&format!(" ({} failed)", self.failed_count));
        }
        message
    }

    /// Serializable view of the batch
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            package_name: self.package_name.clone(),
            success: self.success(),
            successful_count: self.successful_count,
            failed_count: self.failed_count,
            message: self.message(),
            results: self
                .outcomes
                .iter()
                .map(|o| TrackSummary {
                    track: o.track.clone(),
                    success: o.is_success(),
                    deployment: o.result.as_ref().ok().cloned(),
                    error: o.error().map(PublishError::to_detail),
                })
                .collect(),
        }
    }
}

/// Serializable batch deploy result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub package_name: String,
    pub success: bool,
    pub successful_count: usize,
    pub failed_count: usize,
    pub message: String,
    pub results: Vec<TrackSummary>,
}

/// Serializable per-track batch outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeploymentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureDetail>,
}

/// Store listing for one language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Language code (e.g., en-US)
    pub language: String,
    /// App title
    pub title: Option<String>,
    /// Short description
    pub short_description: Option<String>,
    /// Full description
    pub full_description: Option<String>,
    /// Promo video URL
    pub video: Option<String>,
}

/// Requested listing changes; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub video: Option<String>,
}

/// App-level details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDetails {
    /// App package name
    pub package_name: String,
    /// Title in the requested language
    pub title: Option<String>,
    /// Short description in the requested language
    pub short_description: Option<String>,
    /// Full description in the requested language
    pub full_description: Option<String>,
    /// Default listing language
    pub default_language: Option<String>,
    /// Contact email
    pub contact_email: Option<String>,
    /// Contact website
    pub contact_website: Option<String>,
    /// Contact phone
    pub contact_phone: Option<String>,
}

/// Google Groups allowed to test a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testers {
    pub track: Track,
    pub google_groups: Vec<String>,
}

/// Kind of APK expansion file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionFileType {
    Main,
    Patch,
}

impl ExpansionFileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Patch => "patch",
        }
    }
}

impl std::fmt::Display for ExpansionFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExpansionFileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "patch" => Ok(Self::Patch),
            _ => Err(format!("Unknown expansion file type: {} (expected main or patch)", s)),
        }
    }
}

/// Expansion file attached to an APK version.
///
/// Both fields are `None` when the version has no such file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionFile {
    pub version_code: i64,
    pub file_type: ExpansionFileType,
    pub file_size: Option<i64>,
    /// Version code whose file this one reuses
    pub references_version: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_track_roundtrip_and_order() {
        for track in Track::ALL {
            assert_eq!(track.as_str().parse::<Track>().unwrap(), track);
        }
        assert!(Track::Internal < Track::Production);
        assert!("staging".parse::<Track>().is_err());
        assert!("Beta".parse::<Track>().is_err());
    }

    #[test]
    fn test_release_status_wire_names() {
        let status: ReleaseStatus = serde_json::from_str("\"inProgress\"").unwrap();
        assert_eq!(status, ReleaseStatus::InProgress);
        let status: ReleaseStatus = serde_json::from_str("\"statusUnspecified\"").unwrap();
        assert_eq!(status, ReleaseStatus::Unknown);
        assert!(ReleaseStatus::Halted.is_terminal());
        assert!(ReleaseStatus::Completed.is_terminal());
        assert!(!ReleaseStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_rollout_bounds() {
        assert!(RolloutPercentage::new(0.0).is_ok());
        assert!(RolloutPercentage::new(100.0).is_ok());
        assert!(RolloutPercentage::new(-0.5).is_err());
        assert!(RolloutPercentage::new(100.1).is_err());
        assert!(RolloutPercentage::new(f64::NAN).is_err());

        let err = RolloutPercentage::new(150.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_rollout_user_fraction() {
        assert_eq!(RolloutPercentage::new(20.0).unwrap().user_fraction(), Some(0.2));
        assert_eq!(RolloutPercentage::FULL.user_fraction(), None);
        assert_eq!(RolloutPercentage::from_user_fraction(None), 100.0);
        assert_eq!(RolloutPercentage::from_user_fraction(Some(0.5)), 50.0);
    }

    #[test]
    fn test_artifact_missing_file_is_validation_error() {
        let err = Artifact::from_path("/definitely/not/here.aab").unwrap_err();
        let report = err.validation_report().unwrap();
        assert_eq!(report.errors[0].field, "file_path");
    }

    #[test]
    fn test_artifact_kind() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("app-release.aab");
        std::fs::write(&path, b"bundle").unwrap();

        let artifact = Artifact::from_path(&path).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Bundle);
        assert_eq!(artifact.size, 6);
        assert_eq!(ArtifactKind::from_path(Path::new("app.apk")), ArtifactKind::Apk);
    }

    #[test]
    fn test_batch_counts_and_message() {
        let ok = DeploymentResult {
            package_name: "com.example.app".to_string(),
            track: Track::Internal,
            version_code: 7,
            status: ReleaseStatus::Completed,
            rollout_percentage: 100.0,
            edit_id: Some("e1".to_string()),
            message: "ok".to_string(),
        };
        let batch = BatchDeploymentResult::from_outcomes(
            "com.example.app",
            vec![
                TrackOutcome {
                    track: "internal".to_string(),
                    result: Ok(ok),
                },
                TrackOutcome {
                    track: "alpha".to_string(),
                    result: Err(PublishError::from_status(400, "bad")),
                },
            ],
        );

        assert_eq!(batch.successful_count, 1);
        assert_eq!(batch.failed_count, 1);
        assert!(!batch.success());
        assert_eq!(batch.message(), "Deployed to 1/2 tracks successfully (1 failed)");

        let summary = batch.summary();
        assert!(summary.results[0].success);
        assert_eq!(summary.results[1].error.as_ref().unwrap().kind, ErrorKind::BadRequest);
    }

    #[test]
    fn test_release_notes_order() {
        let notes: ReleaseNotes = vec![
            ("fr-FR".to_string(), "Corrections".to_string()),
            ("en-US".to_string(), "Fixes".to_string()),
        ]
        .into_iter()
        .collect();
        let langs: Vec<_> = notes.iter().map(|(l, _)| l).collect();
        assert_eq!(langs, vec!["en-US", "fr-FR"]);
        assert_eq!(notes.get("en-US"), Some("Fixes"));
    }
}
