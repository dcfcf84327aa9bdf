//! Typed wire records for the Android Publisher API

use playdeck_core::{
    AppDetails, ExpansionFile, ExpansionFileType, Listing, Release, ReleaseNotes, ReleaseStatus,
    RolloutPercentage, Testers, Track,
};
use serde::{Deserialize, Serialize};

/// An open edit transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_seconds: Option<String>,
}

/// A binary known to the service, identified by its version code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedBinary {
    pub version_code: i64,
    /// Lowercase hex SHA-256 of the uploaded bytes
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Releases configured on one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub track: Track,
    #[serde(default)]
    pub releases: Vec<TrackRelease>,
}

impl TrackState {
    pub fn new(track: Track, releases: Vec<TrackRelease>) -> Self {
        Self { track, releases }
    }

    /// Index of the release containing a version code
    pub fn position(&self, version_code: i64) -> Option<usize> {
        self.releases.iter().position(|r| r.contains(version_code))
    }

    pub fn find(&self, version_code: i64) -> Option<&TrackRelease> {
        self.releases.iter().find(|r| r.contains(version_code))
    }

    /// Project into the domain model
    pub fn to_releases(&self, package_name: &str) -> Vec<Release> {
        self.releases
            .iter()
            .map(|r| r.to_release(package_name, self.track))
            .collect()
    }
}

/// One release entry of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, with = "version_codes")]
    pub version_codes: Vec<i64>,
    #[serde(default = "unknown_status")]
    pub status: ReleaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_fraction: Option<f64>,
    #[serde(
        default,
        with = "localized_notes",
        skip_serializing_if = "ReleaseNotes::is_empty"
    )]
    pub release_notes: ReleaseNotes,
}

fn unknown_status() -> ReleaseStatus {
    ReleaseStatus::Unknown
}

impl TrackRelease {
    /// A release of `version_codes` at the given rollout.
    ///
    /// Below 100% this is a staged `inProgress` release with a user
    /// fraction; at 100% it is `completed` with no fraction.
    pub fn staged(
        version_codes: Vec<i64>,
        rollout: RolloutPercentage,
        release_notes: ReleaseNotes,
    ) -> Self {
        let mut release = Self {
            name: None,
            version_codes,
            status: ReleaseStatus::InProgress,
            user_fraction: None,
            release_notes,
        };
        release.set_rollout(rollout);
        release
    }

    /// Rewrite status and user fraction for a rollout percentage
    pub fn set_rollout(&mut self, rollout: RolloutPercentage) {
        match rollout.user_fraction() {
            Some(fraction) => {
                self.status = ReleaseStatus::InProgress;
                self.user_fraction = Some(fraction);
            }
            None => {
                self.status = ReleaseStatus::Completed;
                self.user_fraction = None;
            }
        }
    }

    pub fn contains(&self, version_code: i64) -> bool {
        self.version_codes.contains(&version_code)
    }

    /// Rollout percentage; an absent fraction means 100%
    pub fn rollout_percentage(&self) -> f64 {
        RolloutPercentage::from_user_fraction(self.user_fraction)
    }

    /// Whether status and rollout already equal those of `target`
    pub fn matches_rollout(&self, target: &TrackRelease) -> bool {
        self.status == target.status
            && (self.rollout_percentage() - target.rollout_percentage()).abs() < 1e-9
    }

    pub fn to_release(&self, package_name: &str, track: Track) -> Release {
        Release {
            package_name: package_name.to_string(),
            track,
            status: self.status,
            version_codes: self.version_codes.clone(),
            name: self.name.clone(),
            rollout_percentage: self.rollout_percentage(),
            release_notes: self.release_notes.clone(),
        }
    }
}

/// Store listing as sent over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
}

impl From<ListingRecord> for Listing {
    fn from(record: ListingRecord) -> Self {
        Self {
            language: record.language,
            title: record.title,
            short_description: record.short_description,
            full_description: record.full_description,
            video: record.video,
        }
    }
}

impl From<&Listing> for ListingRecord {
    fn from(listing: &Listing) -> Self {
        Self {
            language: listing.language.clone(),
            title: listing.title.clone(),
            short_description: listing.short_description.clone(),
            full_description: listing.full_description.clone(),
            video: listing.video.clone(),
        }
    }
}

/// App-level details as sent over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDetailsRecord {
    #[serde(default)]
    pub default_language: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_website: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl AppDetailsRecord {
    /// Combine with the listing of the requested language
    pub fn into_details(self, package_name: &str, listing: Option<Listing>) -> AppDetails {
        let listing = listing.unwrap_or_default();
        AppDetails {
            package_name: package_name.to_string(),
            title: listing.title,
            short_description: listing.short_description,
            full_description: listing.full_description,
            default_language: self.default_language,
            contact_email: self.contact_email,
            contact_website: self.contact_website,
            contact_phone: self.contact_phone,
        }
    }
}

/// Tester groups of a track as sent over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestersRecord {
    #[serde(default)]
    pub google_groups: Vec<String>,
}

impl TestersRecord {
    pub fn into_testers(self, track: Track) -> Testers {
        Testers {
            track,
            google_groups: self.google_groups,
        }
    }
}

impl From<&Testers> for TestersRecord {
    fn from(testers: &Testers) -> Self {
        Self {
            google_groups: testers.google_groups.clone(),
        }
    }
}

/// Expansion file as sent over the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionFileRecord {
    #[serde(default)]
    pub file_size: Option<Int64>,
    #[serde(default)]
    pub references_version: Option<i64>,
}

impl ExpansionFileRecord {
    pub fn into_expansion_file(
        self,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> ExpansionFile {
        ExpansionFile {
            version_code,
            file_type,
            file_size: self.file_size.and_then(|s| s.value()),
            references_version: self.references_version,
        }
    }
}

/// 64-bit integers travel as decimal strings, occasionally as numbers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Int64 {
    Text(String),
    Number(i64),
}

impl Int64 {
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::Text(text) => text.parse().ok(),
            Self::Number(n) => Some(*n),
        }
    }
}

/// Version codes travel as decimal strings
mod version_codes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(codes: &[i64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(codes.iter().map(|c| c.to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<i64>, D::Error> {
        Vec::<Code>::deserialize(deserializer)?
            .into_iter()
            .map(|code| match code {
                Code::Text(text) => text
                    .parse()
                    .map_err(|_| D::Error::custom(format!("invalid version code: {}", text))),
                Code::Number(n) => Ok(n),
            })
            .collect()
    }
}

/// Release notes travel as `[{language, text}]`
mod localized_notes {
    use playdeck_core::ReleaseNotes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct LocalizedText {
        language: String,
        text: String,
    }

    pub fn serialize<S: Serializer>(notes: &ReleaseNotes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(notes.iter().map(|(language, text)| LocalizedText {
            language: language.to_string(),
            text: text.to_string(),
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<ReleaseNotes, D::Error> {
        Ok(Vec::<LocalizedText>::deserialize(deserializer)?
            .into_iter()
            .map(|n| (n.language, n.text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_release_wire_shape() {
        let release = TrackRelease::staged(
            vec![42],
            RolloutPercentage::new(20.0).unwrap(),
            ReleaseNotes::single("en-US", "Bug fixes"),
        );
        let value = serde_json::to_value(&release).unwrap();
        assert_eq!(
            value,
            json!({
                "versionCodes": ["42"],
                "status": "inProgress",
                "userFraction": 0.2,
                "releaseNotes": [{"language": "en-US", "text": "Bug fixes"}]
            })
        );
    }

    #[test]
    fn test_full_rollout_has_no_fraction() {
        let release = TrackRelease::staged(vec![7], RolloutPercentage::FULL, ReleaseNotes::new());
        let value = serde_json::to_value(&release).unwrap();
        assert_eq!(value, json!({"versionCodes": ["7"], "status": "completed"}));
        assert_eq!(release.rollout_percentage(), 100.0);
    }

    #[test]
    fn test_parse_track_from_service() {
        let state: TrackState = serde_json::from_value(json!({
            "track": "production",
            "releases": [
                {"name": "1.2.0", "versionCodes": ["120"], "status": "halted", "userFraction": 0.05},
                {"versionCodes": [110], "status": "completed"},
                {"versionCodes": ["100"], "status": "somethingNew"}
            ]
        }))
        .unwrap();

        assert_eq!(state.track, Track::Production);
        assert_eq!(state.releases[0].status, ReleaseStatus::Halted);
        assert!((state.releases[0].rollout_percentage() - 5.0).abs() < 1e-9);
        assert_eq!(state.position(110), Some(1));
        assert_eq!(state.releases[2].status, ReleaseStatus::Unknown);

        let releases = state.to_releases("com.example.app");
        assert_eq!(releases[0].name.as_deref(), Some("1.2.0"));
        assert_eq!(releases[1].rollout_percentage, 100.0);
    }

    #[test]
    fn test_rejects_garbage_version_code() {
        let result: std::result::Result<TrackRelease, _> =
            serde_json::from_value(json!({"versionCodes": ["abc"], "status": "completed"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_expansion_file_sizes() {
        let record: ExpansionFileRecord =
            serde_json::from_value(json!({"fileSize": "1048576", "referencesVersion": 40}))
                .unwrap();
        let file = record.into_expansion_file(42, ExpansionFileType::Main);
        assert_eq!(file.file_size, Some(1_048_576));
        assert_eq!(file.references_version, Some(40));

        let empty = ExpansionFileRecord::default().into_expansion_file(42, ExpansionFileType::Patch);
        assert_eq!(empty.file_size, None);
        assert_eq!(empty.file_type, ExpansionFileType::Patch);
    }

    #[test]
    fn test_testers_wire_shape() {
        let testers = Testers {
            track: Track::Alpha,
            google_groups: vec!["qa@googlegroups.com".to_string()],
        };
        let value = serde_json::to_value(TestersRecord::from(&testers)).unwrap();
        assert_eq!(value, json!({"googleGroups": ["qa@googlegroups.com"]}));

        let empty: TestersRecord = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_testers(Track::Beta).google_groups.is_empty());
    }

    #[test]
    fn test_details_merge_listing() {
        let record = AppDetailsRecord {
            default_language: Some("en-US".to_string()),
            contact_email: Some("dev@example.com".to_string()),
            ..Default::default()
        };
        let listing = Listing {
            language: "en-US".to_string(),
            title: Some("Example".to_string()),
            ..Default::default()
        };
        let details = record.into_details("com.example.app", Some(listing));
        assert_eq!(details.title.as_deref(), Some("Example"));
        assert_eq!(details.contact_email.as_deref(), Some("dev@example.com"));
    }
}
