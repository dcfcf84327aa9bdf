//! Google Play Developer API client
//!
//! ## Authentication
//!
//! Each credential is a Google Cloud service account key. A signed JWT is
//! exchanged for an OAuth access token. The cache holds at most one token
//! per service account, tagged with the credential instance it was issued
//! to, so a swapped-in credential never reuses its predecessor's token.
//!
//! ## Endpoints
//!
//! Edits, reviews and monetization live on the Android Publisher API v3.
//! Vitals and app discovery live on the Play Developer Reporting API; one
//! token carries both scopes.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use playdeck_core::config::ApiConfig;
use playdeck_core::{
    AppInfo, Artifact, ArtifactKind, ExpansionFile, ExpansionFileType, InAppProduct, Listing,
    Order, PublishError, Result, Review, ReviewReply, SubscriptionProduct, SubscriptionPurchase,
    Testers, Track, VitalsMetricKind, VoidedPurchase,
};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::commerce::{
    InAppProductRecord, InAppProductsResponse, OrderRecord, SubscriptionPurchaseRecord,
    SubscriptionsPage, VoidedPurchasesResponse,
};
use super::insights::{
    AppsPage, MetricSetRecord, QueryResponse, ReplyResponse, ReviewsResponse, VitalsReport, DAILY,
};
use super::records::{
    AppDetailsRecord, AppEdit, ExpansionFileRecord, ListingRecord, TestersRecord, TrackState,
    UploadedBinary,
};
use super::PublisherApi;
use crate::credentials::{Credential, CredentialProbe};

const SCOPES: &str = "https://www.googleapis.com/auth/androidpublisher \
                      https://www.googleapis.com/auth/playdeveloperreporting";

/// Page size for list endpoints that paginate
const PAGE_SIZE: u32 = 1000;

/// OAuth token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    credential_id: Uuid,
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - Duration::minutes(5)
    }
}

/// Access tokens keyed by service account email
#[derive(Debug, Default)]
struct TokenCache {
    entries: HashMap<String, CachedToken>,
}

impl TokenCache {
    /// A fresh token issued to this exact credential instance
    fn get(&self, credential: &Credential, now: DateTime<Utc>) -> Option<String> {
        self.entries
            .get(credential.client_email())
            .filter(|t| t.credential_id == credential.id() && t.is_fresh(now))
            .map(|t| t.access_token.clone())
    }

    /// Store a token, replacing whatever the account held and dropping
    /// stale entries of other accounts
    fn insert(&mut self, credential: &Credential, token: CachedToken, now: DateTime<Utc>) {
        self.entries.retain(|_, t| t.is_fresh(now));
        self.entries
            .insert(credential.client_email().to_string(), token);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Google Play Developer API v3 over HTTPS
pub struct GooglePlayApi {
    client: Client,
    base_url: String,
    upload_url: String,
    token_url: String,
    reporting_url: String,
    tokens: RwLock<TokenCache>,
}

impl GooglePlayApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PublishError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            reporting_url: config.reporting_url.trim_end_matches('/').to_string(),
            tokens: RwLock::new(TokenCache::default()),
        })
    }

    /// Get or refresh the OAuth2 access token for a credential
    async fn access_token(&self, credential: &Credential) -> Result<String> {
        if let Some(token) = self.tokens.read().await.get(credential, Utc::now()) {
            return Ok(token);
        }

        let token = self.exchange_token(credential).await?;
        let access_token = token.access_token.clone();
        self.tokens
            .write()
            .await
            .insert(credential, token, Utc::now());
        Ok(access_token)
    }

    /// Sign a JWT with the service account key and exchange it for a token
    async fn exchange_token(&self, credential: &Credential) -> Result<CachedToken> {
        let now = Utc::now();
        let claims = Claims {
            iss: credential.client_email(),
            scope: SCOPES,
            aud: &self.token_url,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(
            credential.key().private_key.as_bytes(),
        )
        .map_err(|e| PublishError::Credential(format!("Invalid private key: {}", e)))?;

        let jwt = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &encoding_key,
        )
        .map_err(|e| PublishError::Credential(format!("Failed to sign token request: {}", e)))?;

        debug!(client_email = credential.client_email(), "exchanging service account JWT");
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            // The token endpoint answers 400 invalid_grant for unusable keys
            let status = if status == 400 { 401 } else { status };
            return Err(PublishError::from_status(status, error_message(&text)));
        }

        let token: TokenResponse = decode(status, response).await?;
        Ok(CachedToken {
            credential_id: credential.id(),
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    /// Make an authenticated API request
    async fn api_request<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(credential, method, url, body).await?;
        let status = response.status().as_u16();
        decode(status, response).await
    }

    async fn send(
        &self,
        credential: &Credential,
        method: Method,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let token = self.access_token(credential).await?;

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, %url, "api request");
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    fn edit_url(&self, package: &str, edit_id: &str) -> String {
        format!("{}/applications/{}/edits/{}", self.base_url, package, edit_id)
    }

    fn app_url(&self, package: &str) -> String {
        format!("{}/applications/{}", self.base_url, package)
    }

    fn metric_set_url(&self, package: &str, metric: VitalsMetricKind) -> String {
        format!("{}/apps/{}/{}", self.reporting_url, package, metric.metric_set())
    }

    /// A GET whose 404 means "nothing there"
    async fn get_optional<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        url: String,
    ) -> Result<Option<T>> {
        match self.api_request(credential, Method::GET, url, None).await {
            Ok(value) => Ok(Some(value)),
            Err(PublishError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn upload_collection(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Bundle => "bundles",
        ArtifactKind::Apk => "apks",
    }
}

fn transport_error(e: reqwest::Error) -> PublishError {
    PublishError::transport(e.to_string())
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(PublishError::from_status(status.as_u16(), error_message(&text)))
}

async fn decode<T: DeserializeOwned>(status: u16, response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| PublishError::Api {
        status,
        message: format!("Malformed response: {}", e),
    })
}

/// Pull `error.message` out of a Google API error body
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorBody {
        Detailed { message: String },
        Code(String),
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            error: ErrorBody::Detailed { message },
        }) => message,
        Ok(Envelope {
            error: ErrorBody::Code(code),
        }) => code,
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Upload responses differ between bundles and APKs
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinaryResponse {
    version_code: i64,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    binary: Option<BinaryHashes>,
}

#[derive(Deserialize)]
struct BinaryHashes {
    #[serde(default)]
    sha256: Option<String>,
}

impl From<BinaryResponse> for UploadedBinary {
    fn from(response: BinaryResponse) -> Self {
        let sha256 = response
            .sha256
            .or_else(|| response.binary.and_then(|b| b.sha256))
            .map(|s| s.to_lowercase());
        Self {
            version_code: response.version_code,
            sha256,
        }
    }
}

#[async_trait]
impl CredentialProbe for GooglePlayApi {
    async fn probe(&self, credential: &Credential) -> Result<()> {
        let token = self.exchange_token(credential).await?;
        self.tokens
            .write()
            .await
            .insert(credential, token, Utc::now());
        Ok(())
    }
}

#[async_trait]
impl PublisherApi for GooglePlayApi {
    async fn insert_edit(&self, credential: &Credential, package: &str) -> Result<AppEdit> {
        let url = format!("{}/applications/{}/edits", self.base_url, package);
        self.api_request(credential, Method::POST, url, Some(serde_json::json!({})))
            .await
    }

    async fn commit_edit(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<()> {
        let url = format!("{}:commit", self.edit_url(package, edit_id));
        let _: AppEdit = self.api_request(credential, Method::POST, url, None).await?;
        Ok(())
    }

    async fn delete_edit(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<()> {
        self.send(credential, Method::DELETE, self.edit_url(package, edit_id), None)
            .await?;
        Ok(())
    }

    async fn upload(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        artifact: &Artifact,
    ) -> Result<UploadedBinary> {
        let token = self.access_token(credential).await?;
        let url = format!(
            "{}/applications/{}/edits/{}/{}?uploadType=media",
            self.upload_url,
            package,
            edit_id,
            upload_collection(artifact.kind)
        );

        let content = tokio::fs::read(&artifact.path).await?;
        debug!(%url, size = content.len(), "uploading artifact");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, artifact.kind.content_type())
            .body(content)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;
        let status = response.status().as_u16();

        let binary: BinaryResponse = decode(status, response).await?;
        Ok(binary.into())
    }

    async fn list_uploads(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<UploadedBinary>> {
        #[derive(Deserialize)]
        struct Listed {
            #[serde(default)]
            bundles: Vec<BinaryResponse>,
            #[serde(default)]
            apks: Vec<BinaryResponse>,
        }

        let url = format!(
            "{}/{}",
            self.edit_url(package, edit_id),
            upload_collection(kind)
        );
        let listed: Listed = self.api_request(credential, Method::GET, url, None).await?;
        Ok(listed
            .bundles
            .into_iter()
            .chain(listed.apks)
            .map(UploadedBinary::from)
            .collect())
    }

    async fn get_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<TrackState> {
        let url = format!("{}/tracks/{}", self.edit_url(package, edit_id), track);
        self.api_request(credential, Method::GET, url, None).await
    }

    async fn update_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        state: &TrackState,
    ) -> Result<TrackState> {
        let url = format!("{}/tracks/{}", self.edit_url(package, edit_id), state.track);
        let body = serde_json::to_value(state)?;
        self.api_request(credential, Method::PUT, url, Some(body))
            .await
    }

    async fn get_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        language: &str,
    ) -> Result<Listing> {
        let url = format!("{}/listings/{}", self.edit_url(package, edit_id), language);
        let record: ListingRecord = self.api_request(credential, Method::GET, url, None).await?;
        Ok(record.into())
    }

    async fn update_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        listing: &Listing,
    ) -> Result<Listing> {
        let url = format!(
            "{}/listings/{}",
            self.edit_url(package, edit_id),
            listing.language
        );
        let body = serde_json::to_value(ListingRecord::from(listing))?;
        let record: ListingRecord = self
            .api_request(credential, Method::PUT, url, Some(body))
            .await?;
        Ok(record.into())
    }

    async fn get_details(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<AppDetailsRecord> {
        let url = format!("{}/details", self.edit_url(package, edit_id));
        self.api_request(credential, Method::GET, url, None).await
    }

    async fn list_listings(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<Vec<Listing>> {
        #[derive(Deserialize)]
        struct Listed {
            #[serde(default)]
            listings: Vec<ListingRecord>,
        }

        let url = format!("{}/listings", self.edit_url(package, edit_id));
        let listed: Listed = self.api_request(credential, Method::GET, url, None).await?;
        Ok(listed.listings.into_iter().map(Listing::from).collect())
    }

    async fn get_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<Testers> {
        let url = format!("{}/testers/{}", self.edit_url(package, edit_id), track);
        let record: Option<TestersRecord> = self.get_optional(credential, url).await?;
        Ok(record.unwrap_or_default().into_testers(track))
    }

    async fn update_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        testers: &Testers,
    ) -> Result<Testers> {
        let url = format!("{}/testers/{}", self.edit_url(package, edit_id), testers.track);
        let body = serde_json::to_value(TestersRecord::from(testers))?;
        let record: TestersRecord = self
            .api_request(credential, Method::PUT, url, Some(body))
            .await?;
        Ok(record.into_testers(testers.track))
    }

    async fn get_expansion_file(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> Result<ExpansionFile> {
        let url = format!(
            "{}/apks/{}/expansionFiles/{}",
            self.edit_url(package, edit_id),
            version_code,
            file_type
        );
        let record: Option<ExpansionFileRecord> = self.get_optional(credential, url).await?;
        Ok(record
            .unwrap_or_default()
            .into_expansion_file(version_code, file_type))
    }

    async fn list_apps(&self, credential: &Credential) -> Result<Vec<AppInfo>> {
        let mut apps = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!("{}/apps:search?pageSize={}", self.reporting_url, PAGE_SIZE);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", token));
            }
            let page: AppsPage = self.api_request(credential, Method::GET, url, None).await?;
            apps.extend(page.apps.into_iter().map(AppInfo::from));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(apps),
            }
        }
    }

    async fn list_reviews(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
        start_index: u32,
    ) -> Result<Vec<Review>> {
        let url = format!(
            "{}/reviews?maxResults={}&startIndex={}",
            self.app_url(package),
            max_results,
            start_index
        );
        let response: ReviewsResponse = self.api_request(credential, Method::GET, url, None).await?;
        Ok(response
            .reviews
            .into_iter()
            .filter_map(|r| r.into_review())
            .collect())
    }

    async fn reply_to_review(
        &self,
        credential: &Credential,
        package: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<ReviewReply> {
        let url = format!("{}/reviews/{}:reply", self.app_url(package), review_id);
        let body = serde_json::json!({ "replyText": reply_text });
        let response: ReplyResponse = self
            .api_request(credential, Method::POST, url, Some(body))
            .await?;
        Ok(response.result.into_reply(review_id))
    }

    async fn query_vitals(
        &self,
        credential: &Credential,
        package: &str,
        metric: VitalsMetricKind,
        dimension: Option<&str>,
    ) -> Result<VitalsReport> {
        let set_url = self.metric_set_url(package, metric);
        let set: MetricSetRecord = self
            .api_request(credential, Method::GET, set_url.clone(), None)
            .await?;
        let window = set
            .latest_daily_end()
            .and_then(|end| Some((end.previous_day()?, end)));
        let Some((start, end)) = window else {
            debug!(package, %metric, "no daily vitals published yet");
            return Ok(VitalsReport::default());
        };

        let mut body = serde_json::json!({
            "timelineSpec": {
                "aggregationPeriod": DAILY,
                "startTime": start,
                "endTime": end,
            },
            "metrics": [metric.metric()],
            "pageSize": PAGE_SIZE,
        });
        if let Some(dimension) = dimension {
            body["dimensions"] = serde_json::json!([dimension]);
        }

        let url = format!("{}:query", set_url);
        let response: QueryResponse = self
            .api_request(credential, Method::POST, url, Some(body))
            .await?;
        Ok(VitalsReport {
            freshness: start.to_iso(),
            rows: response.into_rows(metric.metric(), dimension),
        })
    }

    async fn list_subscriptions(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<SubscriptionProduct>> {
        let mut products = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = format!("{}/subscriptions?pageSize={}", self.app_url(package), PAGE_SIZE);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", token));
            }
            let page: SubscriptionsPage = self.api_request(credential, Method::GET, url, None).await?;
            products.extend(page.subscriptions.into_iter().map(|s| s.into_product(package)));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(products),
            }
        }
    }

    async fn get_subscription_purchase(
        &self,
        credential: &Credential,
        package: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionPurchase> {
        let url = format!("{}/purchases/subscriptionsv2/tokens/{}", self.app_url(package), token);
        let record: SubscriptionPurchaseRecord =
            self.api_request(credential, Method::GET, url, None).await?;
        Ok(record.into_purchase(package, subscription_id, token))
    }

    async fn list_voided_purchases(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
    ) -> Result<Vec<VoidedPurchase>> {
        let url = format!(
            "{}/purchases/voidedpurchases?maxResults={}",
            self.app_url(package),
            max_results
        );
        let response: VoidedPurchasesResponse =
            self.api_request(credential, Method::GET, url, None).await?;
        Ok(response
            .voided_purchases
            .into_iter()
            .map(|v| v.into_voided(package))
            .collect())
    }

    async fn list_in_app_products(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<InAppProduct>> {
        let url = format!("{}/inappproducts", self.app_url(package));
        let response: InAppProductsResponse =
            self.api_request(credential, Method::GET, url, None).await?;
        Ok(response
            .inappproduct
            .into_iter()
            .map(|p| p.into_product(package))
            .collect())
    }

    async fn get_in_app_product(
        &self,
        credential: &Credential,
        package: &str,
        sku: &str,
    ) -> Result<InAppProduct> {
        let url = format!("{}/inappproducts/{}", self.app_url(package), sku);
        let record: InAppProductRecord = self.api_request(credential, Method::GET, url, None).await?;
        Ok(record.into_product(package))
    }

    async fn get_order(
        &self,
        credential: &Credential,
        package: &str,
        order_id: &str,
    ) -> Result<Order> {
        let url = format!("{}/orders/{}", self.app_url(package), order_id);
        let record: OrderRecord = self.api_request(credential, Method::GET, url, None).await?;
        Ok(record.into_order(package, order_id))
    }
}
