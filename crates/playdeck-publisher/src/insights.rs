//! Reviews, Android vitals and app discovery
//!
//! None of these touch an edit; each read is retried on its own.

use playdeck_core::validation::{validate_package_name, validate_reply_text};
use playdeck_core::{
    AppInfo, Result, Review, ReviewReply, ValidationIssue, VitalsMetric, VitalsMetricKind,
    VitalsOverview,
};
use tracing::{debug, info};

use crate::client::ApiClient;

/// Reviews returned when the caller sets no page size
pub const DEFAULT_REVIEW_PAGE: u32 = 100;

/// Breakdown used when the caller names no dimension
pub const DEFAULT_VITALS_DIMENSION: &str = "apiLevel";

/// Reads reviews and vitals, posts review replies
#[derive(Clone)]
pub struct InsightsManager {
    client: ApiClient,
}

impl InsightsManager {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Apps the current service account can see
    pub async fn list_apps(&self) -> Result<Vec<AppInfo>> {
        let session = self.client.session();
        let apps = session.retrying("list_apps", |_| session.list_apps()).await?;
        debug!(count = apps.len(), "apps listed");
        Ok(apps)
    }

    /// One page of reviews, newest first
    pub async fn list_reviews(
        &self,
        package_name: &str,
        max_results: Option<u32>,
        start_index: Option<u32>,
    ) -> Result<Vec<Review>> {
        let max_results = max_results.unwrap_or(DEFAULT_REVIEW_PAGE);
        let start_index = start_index.unwrap_or(0);
        let mut report = validate_package_name(package_name);
        if max_results == 0 {
            report.add(ValidationIssue::new(
                "max_results",
                "Must be at least 1",
                "0",
            ));
        }
        report.into_result()?;

        info!(package = package_name, max_results, start_index, "fetching reviews");
        let session = self.client.session();
        session
            .retrying("list_reviews", |_| {
                session.list_reviews(package_name, max_results, start_index)
            })
            .await
    }

    /// Post or replace the developer reply to a review
    pub async fn reply_to_review(
        &self,
        package_name: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<ReviewReply> {
        let mut report = validate_package_name(package_name);
        if review_id.trim().is_empty() {
            report.add(ValidationIssue::new("review_id", "Review ID is required", ""));
        }
        report.merge(validate_reply_text(reply_text));
        report.into_result()?;

        info!(package = package_name, review_id, "replying to review");
        let session = self.client.session();
        session
            .retrying("reply_to_review", |_| {
                session.reply_to_review(package_name, review_id, reply_text)
            })
            .await
    }

    /// Latest daily value of every vitals metric
    pub async fn vitals_overview(&self, package_name: &str) -> Result<VitalsOverview> {
        validate_package_name(package_name).into_result()?;
        info!(package = package_name, "fetching vitals overview");

        let session = self.client.session();
        let mut overview = VitalsOverview {
            package_name: package_name.to_string(),
            ..VitalsOverview::default()
        };
        for kind in VitalsMetricKind::ALL {
            let report = session
                .retrying("query_vitals", |_| session.query_vitals(package_name, kind, None))
                .await?;
            overview.set(kind, report.rows.first().and_then(|row| row.value));
            if overview.freshness.is_none() {
                overview.freshness = report.freshness;
            }
        }
        Ok(overview)
    }

    /// One metric broken down by `dimension` (default `apiLevel`)
    pub async fn vitals_metrics(
        &self,
        package_name: &str,
        metric: VitalsMetricKind,
        dimension: Option<&str>,
    ) -> Result<Vec<VitalsMetric>> {
        let dimension = dimension.unwrap_or(DEFAULT_VITALS_DIMENSION);
        let mut report = validate_package_name(package_name);
        if dimension.trim().is_empty() {
            report.add(ValidationIssue::new("dimension", "Dimension is required", ""));
        }
        report.into_result()?;

        info!(package = package_name, %metric, dimension, "fetching vitals metric");
        let session = self.client.session();
        let report = session
            .retrying("query_vitals", |_| {
                session.query_vitals(package_name, metric, Some(dimension))
            })
            .await?;

        Ok(report
            .rows
            .into_iter()
            .map(|row| {
                VitalsMetric::new(
                    metric,
                    row.value,
                    Some(dimension.to_string()),
                    row.dimension_value,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{VitalsReport, VitalsRow};
    use crate::credentials::{test_credential, CredentialStore};
    use crate::retry::RetryPolicy;
    use crate::testing::{ApiOp, Failure, ScriptedApi};
    use playdeck_core::ErrorKind;
    use std::sync::Arc;

    const PKG: &str = "com.example.app";

    fn manager(api: ScriptedApi) -> (Arc<ScriptedApi>, InsightsManager) {
        let api = Arc::new(api);
        let store = Arc::new(CredentialStore::new(test_credential("ci@example.com"), api.clone()));
        let client = ApiClient::new(api.clone(), store, RetryPolicy::default());
        (api, InsightsManager::new(client))
    }

    fn review(id: &str, stars: u8) -> Review {
        Review {
            review_id: id.to_string(),
            author_name: "Sam".to_string(),
            star_rating: stars,
            comment: "Works well".to_string(),
            language: "en".to_string(),
            device: None,
            android_version: Some(34),
            app_version_code: Some(42),
            app_version_name: Some("1.4.0".to_string()),
            last_modified: None,
            developer_reply: None,
            developer_reply_time: None,
        }
    }

    fn row(dimension_value: Option<&str>, value: f64) -> VitalsRow {
        VitalsRow {
            dimension_value: dimension_value.map(str::to_string),
            value: Some(value),
        }
    }

    #[tokio::test]
    async fn test_reviews_page() {
        let reviews = (1..=5).map(|i| review(&format!("r{i}"), 5)).collect();
        let (_api, manager) = manager(ScriptedApi::new().with_reviews(PKG, reviews));

        let page = manager.list_reviews(PKG, Some(2), Some(1)).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.review_id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r3"]);

        let all = manager.list_reviews(PKG, None, None).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_reply_is_validated_before_sending() {
        let (api, manager) = manager(ScriptedApi::new().with_reviews(PKG, vec![review("r1", 2)]));

        let err = manager
            .reply_to_review(PKG, "r1", &"x".repeat(351))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = manager.reply_to_review(PKG, " ", "Thanks").await.unwrap_err();
        assert_eq!(err.validation_report().unwrap().errors[0].field, "review_id");
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_retries_and_stores() {
        let (api, manager) = manager(ScriptedApi::new().with_reviews(PKG, vec![review("r1", 2)]));
        api.fail(ApiOp::ReplyToReview, [Failure::Status(500)]);

        let reply = manager
            .reply_to_review(PKG, "r1", "Fixed in 1.4.1, thanks!")
            .await
            .unwrap();
        assert_eq!(reply.message, "Reply posted successfully");
        assert_eq!(
            api.reviews(PKG)[0].developer_reply.as_deref(),
            Some("Fixed in 1.4.1, thanks!")
        );

        let err = manager.reply_to_review(PKG, "r9", "Hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_vitals_overview() {
        let (_api, manager) = manager(
            ScriptedApi::new()
                .with_vitals(
                    PKG,
                    VitalsMetricKind::CrashRate,
                    VitalsReport {
                        freshness: Some("2026-10-16".to_string()),
                        rows: vec![row(None, 0.004), row(Some("34"), 0.002)],
                    },
                )
                .with_vitals(
                    PKG,
                    VitalsMetricKind::AnrRate,
                    VitalsReport {
                        freshness: Some("2026-10-16".to_string()),
                        rows: vec![row(None, 0.006)],
                    },
                ),
        );

        let overview = manager.vitals_overview(PKG).await.unwrap();
        assert_eq!(overview.crash_rate, Some(0.004));
        assert_eq!(overview.anr_rate, Some(0.006));
        assert_eq!(overview.excessive_wakeups, None);
        assert_eq!(overview.freshness.as_deref(), Some("2026-10-16"));
    }

    #[tokio::test]
    async fn test_vitals_metrics_by_dimension() {
        let (api, manager) = manager(ScriptedApi::new().with_vitals(
            PKG,
            VitalsMetricKind::AnrRate,
            VitalsReport {
                freshness: Some("2026-10-16".to_string()),
                rows: vec![row(None, 0.003), row(Some("33"), 0.002), row(Some("34"), 0.009)],
            },
        ));

        let metrics = manager
            .vitals_metrics(PKG, VitalsMetricKind::AnrRate, None)
            .await
            .unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].dimension.as_deref(), Some("apiLevel"));
        assert_eq!(metrics[0].is_below_threshold, Some(true));
        assert_eq!(metrics[1].dimension_value.as_deref(), Some("34"));
        assert_eq!(metrics[1].is_below_threshold, Some(false));
        assert_eq!(api.count(ApiOp::QueryVitals), 1);
    }

    #[tokio::test]
    async fn test_list_apps() {
        let (_api, manager) = manager(ScriptedApi::new().with_app(AppInfo {
            package_name: PKG.to_string(),
            title: Some("Playdeck Demo".to_string()),
            default_language: None,
        }));
        let apps = manager.list_apps().await.unwrap();
        assert_eq!(apps[0].package_name, PKG);
    }
}
