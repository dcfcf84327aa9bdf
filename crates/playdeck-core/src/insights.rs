//! Apps, user reviews and Android vitals
//!
//! Read-side data about how an app is doing in the store. Review text is
//! returned in the language the reviewer wrote it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An app visible to the service account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub package_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
}

/// A user review with the developer's reply, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub author_name: String,
    /// 1 to 5
    pub star_rating: u8,
    pub comment: String,
    /// Language the reviewer wrote in
    pub language: String,
    pub device: Option<String>,
    pub android_version: Option<i32>,
    pub app_version_code: Option<i64>,
    pub app_version_name: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub developer_reply: Option<String>,
    pub developer_reply_time: Option<DateTime<Utc>>,
}

/// A posted reply to a review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReply {
    pub review_id: String,
    pub reply_text: String,
    pub last_edited: Option<DateTime<Utc>>,
    pub message: String,
}

/// Android vitals metrics with a bad-behavior threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalsMetricKind {
    CrashRate,
    AnrRate,
    ExcessiveWakeups,
    StuckWakeLocks,
}

impl VitalsMetricKind {
    pub const ALL: [VitalsMetricKind; 4] = [
        Self::CrashRate,
        Self::AnrRate,
        Self::ExcessiveWakeups,
        Self::StuckWakeLocks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrashRate => "crash_rate",
            Self::AnrRate => "anr_rate",
            Self::ExcessiveWakeups => "excessive_wakeups",
            Self::StuckWakeLocks => "stuck_wake_locks",
        }
    }

    /// Reporting API metric set holding this metric
    pub fn metric_set(&self) -> &'static str {
        match self {
            Self::CrashRate => "crashRateMetricSet",
            Self::AnrRate => "anrRateMetricSet",
            Self::ExcessiveWakeups => "excessiveWakeupRateMetricSet",
            Self::StuckWakeLocks => "stuckBackgroundWakelockRateMetricSet",
        }
    }

    /// Metric name within the set
    pub fn metric(&self) -> &'static str {
        match self {
            Self::CrashRate => "userPerceivedCrashRate",
            Self::AnrRate => "userPerceivedAnrRate",
            Self::ExcessiveWakeups => "excessiveWakeupRate",
            Self::StuckWakeLocks => "stuckBgWakelockRate",
        }
    }

    /// Rate at or above which Play considers the app to behave badly
    pub fn bad_behavior_threshold(&self) -> f64 {
        match self {
            Self::CrashRate => 0.0109,
            Self::AnrRate => 0.0047,
            Self::ExcessiveWakeups | Self::StuckWakeLocks => 0.05,
        }
    }
}

impl std::fmt::Display for VitalsMetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VitalsMetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crash_rate" | "crashRate" => Ok(Self::CrashRate),
            "anr_rate" | "anrRate" => Ok(Self::AnrRate),
            "excessive_wakeups" | "excessiveWakeups" => Ok(Self::ExcessiveWakeups),
            "stuck_wake_locks" | "stuckWakeLocks" => Ok(Self::StuckWakeLocks),
            _ => Err(format!(
                "Unknown vitals metric: {} (expected crash_rate, anr_rate, excessive_wakeups or stuck_wake_locks)",
                s
            )),
        }
    }
}

/// One value of a vitals metric, optionally broken down by a dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsMetric {
    pub metric_type: VitalsMetricKind,
    pub value: Option<f64>,
    pub benchmark: f64,
    /// `None` when there is no value to compare
    pub is_below_threshold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_value: Option<String>,
}

impl VitalsMetric {
    pub fn new(
        metric_type: VitalsMetricKind,
        value: Option<f64>,
        dimension: Option<String>,
        dimension_value: Option<String>,
    ) -> Self {
        let benchmark = metric_type.bad_behavior_threshold();
        Self {
            metric_type,
            value,
            benchmark,
            is_below_threshold: value.map(|v| v < benchmark),
            dimension,
            dimension_value,
        }
    }
}

/// Latest daily value of every vitals metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsOverview {
    pub package_name: String,
    pub crash_rate: Option<f64>,
    pub anr_rate: Option<f64>,
    pub excessive_wakeups: Option<f64>,
    pub stuck_wake_locks: Option<f64>,
    /// Day the values describe (`YYYY-MM-DD`)
    pub freshness: Option<String>,
}

impl VitalsOverview {
    pub fn set(&mut self, kind: VitalsMetricKind, value: Option<f64>) {
        let slot = match kind {
            VitalsMetricKind::CrashRate => &mut self.crash_rate,
            VitalsMetricKind::AnrRate => &mut self.anr_rate,
            VitalsMetricKind::ExcessiveWakeups => &mut self.excessive_wakeups,
            VitalsMetricKind::StuckWakeLocks => &mut self.stuck_wake_locks,
        };
        *slot = value;
    }

    pub fn get(&self, kind: VitalsMetricKind) -> Option<f64> {
        match kind {
            VitalsMetricKind::CrashRate => self.crash_rate,
            VitalsMetricKind::AnrRate => self.anr_rate,
            VitalsMetricKind::ExcessiveWakeups => self.excessive_wakeups,
            VitalsMetricKind::StuckWakeLocks => self.stuck_wake_locks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_parse_both_spellings() {
        assert_eq!("crashRate".parse::<VitalsMetricKind>(), Ok(VitalsMetricKind::CrashRate));
        assert_eq!("anr_rate".parse::<VitalsMetricKind>(), Ok(VitalsMetricKind::AnrRate));
        for kind in VitalsMetricKind::ALL {
            assert_eq!(kind.as_str().parse::<VitalsMetricKind>(), Ok(kind));
        }
        assert!("battery".parse::<VitalsMetricKind>().is_err());
    }

    #[test]
    fn test_threshold_comparison() {
        let good = VitalsMetric::new(VitalsMetricKind::CrashRate, Some(0.002), None, None);
        assert_eq!(good.benchmark, 0.0109);
        assert_eq!(good.is_below_threshold, Some(true));

        let bad = VitalsMetric::new(VitalsMetricKind::AnrRate, Some(0.01), None, None);
        assert_eq!(bad.is_below_threshold, Some(false));

        let empty = VitalsMetric::new(VitalsMetricKind::StuckWakeLocks, None, None, None);
        assert_eq!(empty.is_below_threshold, None);
    }

    #[test]
    fn test_overview_slots() {
        let mut overview = VitalsOverview::default();
        overview.set(VitalsMetricKind::ExcessiveWakeups, Some(0.01));
        assert_eq!(overview.get(VitalsMetricKind::ExcessiveWakeups), Some(0.01));
        assert_eq!(overview.get(VitalsMetricKind::CrashRate), None);
    }
}
