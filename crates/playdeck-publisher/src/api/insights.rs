//! Wire records for reviews and the Reporting API

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use playdeck_core::{AppInfo, Review, ReviewReply};
use serde::{Deserialize, Serialize};

use super::records::Int64;

/// Aggregation period queried for vitals
pub const DAILY: &str = "DAILY";

/// Seconds-based timestamp
#[derive(Debug, Clone, Deserialize)]
pub struct Timestamp {
    seconds: Int64,
    #[serde(default)]
    nanos: u32,
}

impl Timestamp {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds.value()?, self.nanos)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewsResponse {
    #[serde(default)]
    pub reviews: Vec<ReviewRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub review_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    #[serde(default)]
    pub user_comment: Option<UserComment>,
    #[serde(default)]
    pub developer_comment: Option<DeveloperComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserComment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
    #[serde(default)]
    pub star_rating: u8,
    #[serde(default)]
    pub reviewer_language: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub android_os_version: Option<i32>,
    #[serde(default)]
    pub app_version_code: Option<i64>,
    #[serde(default)]
    pub app_version_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperComment {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub last_modified: Option<Timestamp>,
}

impl ReviewRecord {
    /// The review with its latest user and developer comments.
    ///
    /// `None` when the review carries no user comment.
    pub fn into_review(self) -> Option<Review> {
        let mut user = None;
        let mut developer = None;
        for comment in self.comments {
            if comment.user_comment.is_some() {
                user = comment.user_comment;
            }
            if comment.developer_comment.is_some() {
                developer = comment.developer_comment;
            }
        }
        let user = user?;

        Some(Review {
            review_id: self.review_id,
            author_name: self.author_name.unwrap_or_else(|| "Anonymous".to_string()),
            star_rating: user.star_rating,
            comment: user.text.trim().to_string(),
            language: user.reviewer_language.unwrap_or_else(|| "en".to_string()),
            device: user.device,
            android_version: user.android_os_version,
            app_version_code: user.app_version_code,
            app_version_name: user.app_version_name,
            last_modified: user.last_modified.as_ref().and_then(Timestamp::to_utc),
            developer_reply_time: developer
                .as_ref()
                .and_then(|d| d.last_modified.as_ref())
                .and_then(Timestamp::to_utc),
            developer_reply: developer.map(|d| d.text),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyResponse {
    pub result: ReplyResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResult {
    #[serde(default)]
    pub reply_text: String,
    #[serde(default)]
    pub last_edited: Option<Timestamp>,
}

impl ReplyResult {
    pub fn into_reply(self, review_id: &str) -> ReviewReply {
        ReviewReply {
            review_id: review_id.to_string(),
            reply_text: self.reply_text,
            last_edited: self.last_edited.as_ref().and_then(Timestamp::to_utc),
            message: "Reply posted successfully".to_string(),
        }
    }
}

/// One page of `apps:search`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsPage {
    #[serde(default)]
    pub apps: Vec<AppRecord>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    pub package_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl From<AppRecord> for AppInfo {
    fn from(record: AppRecord) -> Self {
        Self {
            package_name: record.package_name,
            title: record.display_name,
            default_language: None,
        }
    }
}

/// Calendar date with the zone the service reports it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<TimeZone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZone {
    pub id: String,
}

impl ReportingDate {
    fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// The same time one day earlier
    pub fn previous_day(&self) -> Option<Self> {
        let previous = self.date()? - Duration::days(1);
        Some(Self {
            year: previous.year(),
            month: previous.month(),
            day: previous.day(),
            time_zone: self.time_zone.clone(),
        })
    }

    pub fn to_iso(&self) -> Option<String> {
        Some(self.date()?.format("%Y-%m-%d").to_string())
    }
}

/// Metric set resource, read for its freshness
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSetRecord {
    #[serde(default)]
    pub freshness_info: Option<FreshnessInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FreshnessInfo {
    #[serde(default)]
    pub freshnesses: Vec<Freshness>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Freshness {
    pub aggregation_period: String,
    pub latest_end_time: ReportingDate,
}

impl MetricSetRecord {
    /// Exclusive end of the latest complete day
    pub fn latest_daily_end(&self) -> Option<&ReportingDate> {
        self.freshness_info
            .as_ref()?
            .freshnesses
            .iter()
            .find(|f| f.aggregation_period == DAILY)
            .map(|f| &f.latest_end_time)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<MetricsRow>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsRow {
    #[serde(default)]
    pub dimensions: Vec<DimensionValue>,
    #[serde(default)]
    pub metrics: Vec<MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionValue {
    pub dimension: String,
    #[serde(default)]
    pub string_value: Option<String>,
    #[serde(default)]
    pub int64_value: Option<Int64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub metric: String,
    #[serde(default)]
    pub decimal_value: Option<DecimalValue>,
}

#[derive(Debug, Deserialize)]
pub struct DecimalValue {
    pub value: String,
}

/// Latest day of one vitals metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalsReport {
    /// Day the rows describe (`YYYY-MM-DD`); `None` when no data is published yet
    pub freshness: Option<String>,
    pub rows: Vec<VitalsRow>,
}

/// One row of a vitals query
#[derive(Debug, Clone, PartialEq)]
pub struct VitalsRow {
    /// Dimension value, `None` for an undimensioned query
    pub dimension_value: Option<String>,
    pub value: Option<f64>,
}

impl QueryResponse {
    pub fn into_rows(self, metric: &str, dimension: Option<&str>) -> Vec<VitalsRow> {
        self.rows
            .into_iter()
            .map(|row| {
                let dimension_value = dimension.and_then(|name| {
                    row.dimensions.iter().find(|d| d.dimension == name).and_then(|d| {
                        d.string_value
                            .clone()
                            .or_else(|| d.int64_value.as_ref()?.value().map(|v| v.to_string()))
                    })
                });
                let value = row
                    .metrics
                    .iter()
                    .find(|m| m.metric == metric)
                    .and_then(|m| m.decimal_value.as_ref()?.value.parse().ok());
                VitalsRow {
                    dimension_value,
                    value,
                }
            })
            .collect()
    }
}
