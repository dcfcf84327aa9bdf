//! Release, listing and reporting routes
//!
//! Every handler reaches Google Play through managers that share the
//! endpoint's credential store, so a key installed via `/credentials` is
//! used by the next request that starts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use playdeck_core::{
    AppDetails, AppInfo, BatchSummary, DeploymentResult, ExpansionFile, ExpansionFileType,
    InAppProduct, Listing, ListingUpdate, Order, PublishError, Review, ReviewReply,
    SubscriptionProduct, SubscriptionPurchase, Testers, TrackReleases, VitalsMetric,
    VitalsMetricKind, VitalsOverview, VoidedPurchase,
};
use playdeck_publisher::{
    BatchDeployRequest, DeployRequest, PromoteRequest, ReleaseNotesInput, TestersUpdate,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use crate::error::EndpointError;
use crate::AppState;

type Reply<T> = Result<Json<T>, EndpointError>;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/apps", get(list_apps))
        .route("/apps/:package/releases", get(releases))
        .route("/apps/:package/deploy", post(deploy))
        .route("/apps/:package/batch-deploy", post(batch_deploy))
        .route("/apps/:package/promote", post(promote))
        .route("/apps/:package/tracks/:track/halt", post(halt))
        .route("/apps/:package/tracks/:track/rollout", post(rollout))
        .route(
            "/apps/:package/tracks/:track/testers",
            get(testers).put(update_testers),
        )
        .route("/apps/:package/listings", get(listings))
        .route(
            "/apps/:package/listings/:language",
            get(listing).patch(update_listing),
        )
        .route("/apps/:package/details", get(details))
        .route("/apps/:package/reviews", get(reviews))
        .route("/apps/:package/reviews/:review_id/reply", post(reply))
        .route("/apps/:package/vitals", get(vitals_overview))
        .route("/apps/:package/vitals/:metric", get(vitals_metric))
        .route("/apps/:package/subscriptions", get(subscriptions))
        .route(
            "/apps/:package/subscriptions/:subscription_id/purchases/:token",
            get(subscription_purchase),
        )
        .route("/apps/:package/voided-purchases", get(voided_purchases))
        .route("/apps/:package/in-app-products", get(in_app_products))
        .route("/apps/:package/in-app-products/:sku", get(in_app_product))
        .route("/apps/:package/orders/:order_id", get(order))
        .route(
            "/apps/:package/expansion-files/:version_code",
            get(expansion_file),
        )
}

fn full_rollout() -> f64 {
    100.0
}

#[derive(Debug, Deserialize)]
struct DeployBody {
    track: String,
    artifact_path: PathBuf,
    #[serde(default)]
    release_notes: Option<ReleaseNotesInput>,
    #[serde(default = "full_rollout")]
    rollout_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct BatchDeployBody {
    artifact_path: PathBuf,
    tracks: Vec<String>,
    #[serde(default)]
    release_notes: Option<ReleaseNotesInput>,
    #[serde(default = "full_rollout")]
    rollout_percentage: f64,
    #[serde(default)]
    track_rollouts: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct PromoteBody {
    from_track: String,
    to_track: String,
    version_code: i64,
    #[serde(default = "full_rollout")]
    rollout_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct HaltBody {
    version_code: i64,
}

#[derive(Debug, Deserialize)]
struct RolloutBody {
    version_code: i64,
    rollout_percentage: f64,
}

#[derive(Debug, Deserialize)]
struct TestersBody {
    google_groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    reply_text: String,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    max_results: Option<u32>,
    start_index: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageQuery {
    language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DimensionQuery {
    dimension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExpansionQuery {
    file_type: Option<String>,
}

/// Request bodies are decoded by hand so every failure keeps the JSON error shape
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, EndpointError> {
    serde_json::from_slice(body)
        .map_err(|e| EndpointError::Malformed(format!("Invalid request body: {}", e)))
}

fn respond<T>(operation: &str, result: Result<T, PublishError>) -> Reply<T> {
    result.map(Json).map_err(|e| {
        warn!(operation, kind = ?e.kind(), error = %e, "request failed");
        EndpointError::Publish(e)
    })
}

async fn list_apps(State(state): State<AppState>) -> Reply<Vec<AppInfo>> {
    respond("list_apps", state.insights.list_apps().await)
}

async fn releases(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Reply<Vec<TrackReleases>> {
    respond("get_releases", state.releases.get_releases(&package).await)
}

async fn deploy(
    State(state): State<AppState>,
    Path(package): Path<String>,
    body: Bytes,
) -> Reply<DeploymentResult> {
    let body: DeployBody = parse_body(&body)?;
    let request = DeployRequest {
        package_name: package,
        track: body.track,
        artifact: body.artifact_path,
        release_notes: body.release_notes,
        rollout_percentage: body.rollout_percentage,
    };
    respond("deploy", state.releases.deploy(&request).await)
}

async fn batch_deploy(
    State(state): State<AppState>,
    Path(package): Path<String>,
    body: Bytes,
) -> Reply<BatchSummary> {
    let body: BatchDeployBody = parse_body(&body)?;
    let request = BatchDeployRequest {
        package_name: package,
        artifact: body.artifact_path,
        tracks: body.tracks,
        release_notes: body.release_notes,
        rollout_percentage: body.rollout_percentage,
        track_rollouts: body.track_rollouts,
    };
    let result = state.releases.batch_deploy(&request).await;
    respond("batch_deploy", result.map(|batch| batch.summary()))
}

async fn promote(
    State(state): State<AppState>,
    Path(package): Path<String>,
    body: Bytes,
) -> Reply<DeploymentResult> {
    let body: PromoteBody = parse_body(&body)?;
    let request = PromoteRequest {
        package_name: package,
        from_track: body.from_track,
        to_track: body.to_track,
        version_code: body.version_code,
        rollout_percentage: body.rollout_percentage,
    };
    respond("promote", state.releases.promote(&request).await)
}

async fn halt(
    State(state): State<AppState>,
    Path((package, track)): Path<(String, String)>,
    body: Bytes,
) -> Reply<DeploymentResult> {
    let body: HaltBody = parse_body(&body)?;
    respond(
        "halt",
        state.releases.halt(&package, &track, body.version_code).await,
    )
}

async fn rollout(
    State(state): State<AppState>,
    Path((package, track)): Path<(String, String)>,
    body: Bytes,
) -> Reply<DeploymentResult> {
    let body: RolloutBody = parse_body(&body)?;
    let result = state
        .releases
        .update_rollout(&package, &track, body.version_code, body.rollout_percentage)
        .await;
    respond("update_rollout", result)
}

async fn testers(
    State(state): State<AppState>,
    Path((package, track)): Path<(String, String)>,
) -> Reply<Testers> {
    respond("get_testers", state.releases.get_testers(&package, &track).await)
}

async fn update_testers(
    State(state): State<AppState>,
    Path((package, track)): Path<(String, String)>,
    body: Bytes,
) -> Reply<TestersUpdate> {
    let body: TestersBody = parse_body(&body)?;
    let result = state
        .releases
        .update_testers(&package, &track, body.google_groups)
        .await;
    respond("update_testers", result)
}

async fn listings(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Reply<Vec<Listing>> {
    respond("list_listings", state.listings.list_all_listings(&package).await)
}

async fn listing(
    State(state): State<AppState>,
    Path((package, language)): Path<(String, String)>,
) -> Reply<Listing> {
    respond("get_listing", state.listings.get_listing(&package, &language).await)
}

async fn update_listing(
    State(state): State<AppState>,
    Path((package, language)): Path<(String, String)>,
    body: Bytes,
) -> Reply<Listing> {
    let update: ListingUpdate = parse_body(&body)?;
    let result = state
        .listings
        .update_listing(&package, &language, &update)
        .await;
    respond("update_listing", result)
}

async fn details(
    State(state): State<AppState>,
    Path(package): Path<String>,
    Query(query): Query<LanguageQuery>,
) -> Reply<AppDetails> {
    let language = query.language.as_deref().unwrap_or(&state.default_language);
    respond(
        "get_app_details",
        state.listings.get_app_details(&package, language).await,
    )
}

async fn reviews(
    State(state): State<AppState>,
    Path(package): Path<String>,
    Query(page): Query<PageQuery>,
) -> Reply<Vec<Review>> {
    let result = state
        .insights
        .list_reviews(&package, page.max_results, page.start_index)
        .await;
    respond("list_reviews", result)
}

async fn reply(
    State(state): State<AppState>,
    Path((package, review_id)): Path<(String, String)>,
    body: Bytes,
) -> Reply<ReviewReply> {
    let body: ReplyBody = parse_body(&body)?;
    let result = state
        .insights
        .reply_to_review(&package, &review_id, &body.reply_text)
        .await;
    respond("reply_to_review", result)
}

async fn vitals_overview(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Reply<VitalsOverview> {
    respond("vitals_overview", state.insights.vitals_overview(&package).await)
}

async fn vitals_metric(
    State(state): State<AppState>,
    Path((package, metric)): Path<(String, String)>,
    Query(query): Query<DimensionQuery>,
) -> Reply<Vec<VitalsMetric>> {
    let metric: VitalsMetricKind = metric.parse().map_err(EndpointError::Malformed)?;
    let result = state
        .insights
        .vitals_metrics(&package, metric, query.dimension.as_deref())
        .await;
    respond("vitals_metrics", result)
}

async fn subscriptions(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Reply<Vec<SubscriptionProduct>> {
    respond(
        "list_subscriptions",
        state.commerce.list_subscriptions(&package).await,
    )
}

async fn subscription_purchase(
    State(state): State<AppState>,
    Path((package, subscription_id, token)): Path<(String, String, String)>,
) -> Reply<SubscriptionPurchase> {
    let result = state
        .commerce
        .get_subscription_purchase(&package, &subscription_id, &token)
        .await;
    respond("get_subscription_purchase", result)
}

async fn voided_purchases(
    State(state): State<AppState>,
    Path(package): Path<String>,
    Query(page): Query<PageQuery>,
) -> Reply<Vec<VoidedPurchase>> {
    let result = state
        .commerce
        .list_voided_purchases(&package, page.max_results)
        .await;
    respond("list_voided_purchases", result)
}

async fn in_app_products(
    State(state): State<AppState>,
    Path(package): Path<String>,
) -> Reply<Vec<InAppProduct>> {
    respond(
        "list_in_app_products",
        state.commerce.list_in_app_products(&package).await,
    )
}

async fn in_app_product(
    State(state): State<AppState>,
    Path((package, sku)): Path<(String, String)>,
) -> Reply<InAppProduct> {
    respond(
        "get_in_app_product",
        state.commerce.get_in_app_product(&package, &sku).await,
    )
}

async fn order(
    State(state): State<AppState>,
    Path((package, order_id)): Path<(String, String)>,
) -> Reply<Order> {
    respond("get_order", state.commerce.get_order(&package, &order_id).await)
}

async fn expansion_file(
    State(state): State<AppState>,
    Path((package, version_code)): Path<(String, String)>,
    Query(query): Query<ExpansionQuery>,
) -> Reply<ExpansionFile> {
    let version_code: i64 = version_code
        .parse()
        .map_err(|_| EndpointError::Malformed(format!("Invalid version code: {}", version_code)))?;
    let file_type = match query.file_type.as_deref() {
        Some(name) => name
            .parse::<ExpansionFileType>()
            .map_err(EndpointError::Malformed)?,
        None => ExpansionFileType::Main,
    };
    let result = state
        .releases
        .get_expansion_file(&package, version_code, file_type)
        .await;
    respond("get_expansion_file", result)
}
