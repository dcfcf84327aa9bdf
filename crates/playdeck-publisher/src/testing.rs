//! In-memory publisher for tests
//!
//! [`ScriptedApi`] models the remote edit workflow: edits stage track,
//! listing, tester and upload changes that become visible to new edits only
//! after commit. Reviews, vitals and monetization data are seeded directly.
//! Failures can be scripted per operation.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use playdeck_core::{
    AppInfo, Artifact, ArtifactKind, ExpansionFile, ExpansionFileType, InAppProduct, Listing,
    Order, PublishError, ReleaseStatus, Result, Review, ReviewReply, SubscriptionProduct,
    SubscriptionPurchase, Testers, Track, VitalsMetricKind, VoidedPurchase,
};
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use crate::api::{
    AppDetailsRecord, AppEdit, PublisherApi, TrackRelease, TrackState, UploadedBinary,
    VitalsReport,
};
use crate::credentials::{Credential, CredentialProbe};

/// Remote operations that can be scripted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    Probe,
    InsertEdit,
    CommitEdit,
    DeleteEdit,
    Upload,
    ListUploads,
    GetTrack,
    UpdateTrack,
    GetListing,
    UpdateListing,
    GetDetails,
    ListListings,
    GetTesters,
    UpdateTesters,
    GetExpansionFile,
    ListApps,
    ListReviews,
    ReplyToReview,
    QueryVitals,
    ListSubscriptions,
    GetSubscriptionPurchase,
    ListVoidedPurchases,
    ListInAppProducts,
    GetInAppProduct,
    GetOrder,
}

/// A scripted outcome for the next call of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Fail with an HTTP status before doing anything
    Status(u16),
    /// Fail with a transport error before doing anything
    Transport,
    /// Apply the call, then report the status (lost response)
    AfterApply(u16),
}

/// A call observed by the scripted API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub op: ApiOp,
    pub package: String,
    /// Track of a track or tester call
    pub track: Option<Track>,
    pub client_email: String,
}

/// Pause point for concurrency tests
///
/// Every call caught by the hold waits until [`Hold::release`].
pub struct Hold {
    arrived: watch::Sender<usize>,
    released: watch::Sender<bool>,
}

impl Hold {
    fn new() -> Self {
        Self {
            arrived: watch::Sender::new(0),
            released: watch::Sender::new(false),
        }
    }

    /// Wait until `calls` calls are parked at the hold
    pub async fn arrived(&self, calls: usize) {
        let mut arrived = self.arrived.subscribe();
        let _ = arrived.wait_for(|n| *n >= calls).await;
    }

    /// Let every parked call continue, and any later caught call pass
    pub fn release(&self) {
        self.released.send_replace(true);
    }

    async fn park(&self) {
        let mut released = self.released.subscribe();
        self.arrived.send_modify(|n| *n += 1);
        let _ = released.wait_for(|r| *r).await;
    }
}

struct Armed {
    hold: Arc<Hold>,
    remaining: usize,
}

#[derive(Default)]
struct Edit {
    package: String,
    tracks: HashMap<Track, Vec<TrackRelease>>,
    listings: HashMap<String, Listing>,
    testers: HashMap<Track, Vec<String>>,
}

#[derive(Default)]
struct State {
    tracks: HashMap<(String, Track), Vec<TrackRelease>>,
    listings: HashMap<(String, String), Listing>,
    details: HashMap<String, AppDetailsRecord>,
    binaries: HashMap<String, Vec<(ArtifactKind, UploadedBinary)>>,
    edits: HashMap<String, Edit>,
    pending_uploads: HashMap<String, Vec<(ArtifactKind, UploadedBinary)>>,
    next_edit: u64,
    next_version_code: i64,
    failures: HashMap<ApiOp, VecDeque<Failure>>,
    track_failures: HashMap<Track, VecDeque<Failure>>,
    holds: HashMap<ApiOp, Armed>,
    rejected: HashSet<String>,
    calls: Vec<RecordedCall>,
    testers: HashMap<(String, Track), Vec<String>>,
    expansion_files: HashMap<(String, i64, ExpansionFileType), ExpansionFile>,
    apps: Vec<AppInfo>,
    reviews: HashMap<String, Vec<Review>>,
    vitals: HashMap<(String, VitalsMetricKind), VitalsReport>,
    subscriptions: HashMap<String, Vec<SubscriptionProduct>>,
    purchases: HashMap<(String, String), SubscriptionPurchase>,
    voided: HashMap<String, Vec<VoidedPurchase>>,
    products: HashMap<String, Vec<InAppProduct>>,
    orders: HashMap<(String, String), Order>,
}

/// Scripted in-memory implementation of [`PublisherApi`]
pub struct ScriptedApi {
    state: Mutex<State>,
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_version_code: 100,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed committed releases for a track
    pub fn with_track(self, package: &str, track: Track, releases: Vec<TrackRelease>) -> Self {
        self.state()
            .tracks
            .insert((package.to_string(), track), releases);
        self
    }

    /// Seed a committed listing
    pub fn with_listing(self, package: &str, listing: Listing) -> Self {
        self.state()
            .listings
            .insert((package.to_string(), listing.language.clone()), listing);
        self
    }

    /// Seed app details
    pub fn with_details(self, package: &str, details: AppDetailsRecord) -> Self {
        self.state().details.insert(package.to_string(), details);
        self
    }

    /// Seed committed tester groups for a track
    pub fn with_testers(self, package: &str, testers: Testers) -> Self {
        self.state()
            .testers
            .insert((package.to_string(), testers.track), testers.google_groups);
        self
    }

    pub fn with_expansion_file(self, package: &str, file: ExpansionFile) -> Self {
        self.state()
            .expansion_files
            .insert((package.to_string(), file.version_code, file.file_type), file);
        self
    }

    /// Seed an app visible to every credential
    pub fn with_app(self, app: AppInfo) -> Self {
        self.state().apps.push(app);
        self
    }

    /// Seed reviews, newest first
    pub fn with_reviews(self, package: &str, reviews: Vec<Review>) -> Self {
        self.state().reviews.insert(package.to_string(), reviews);
        self
    }

    /// Seed the latest day of a metric; rows with a dimension value answer
    /// dimensioned queries, the others answer undimensioned ones
    pub fn with_vitals(self, package: &str, metric: VitalsMetricKind, report: VitalsReport) -> Self {
        self.state()
            .vitals
            .insert((package.to_string(), metric), report);
        self
    }

    pub fn with_subscription(self, product: SubscriptionProduct) -> Self {
        self.state()
            .subscriptions
            .entry(product.package_name.clone())
            .or_default()
            .push(product);
        self
    }

    pub fn with_purchase(self, purchase: SubscriptionPurchase) -> Self {
        self.state().purchases.insert(
            (purchase.package_name.clone(), purchase.purchase_token.clone()),
            purchase,
        );
        self
    }

    pub fn with_voided(self, voided: VoidedPurchase) -> Self {
        self.state()
            .voided
            .entry(voided.package_name.clone())
            .or_default()
            .push(voided);
        self
    }

    pub fn with_product(self, product: InAppProduct) -> Self {
        self.state()
            .products
            .entry(product.package_name.clone())
            .or_default()
            .push(product);
        self
    }

    pub fn with_order(self, order: Order) -> Self {
        self.state()
            .orders
            .insert((order.package_name.clone(), order.order_id.clone()), order);
        self
    }

    /// Version code assigned to the next new upload
    pub fn with_next_version_code(self, version_code: i64) -> Self {
        self.state().next_version_code = version_code;
        self
    }

    /// Queue failures for the next calls of `op`
    pub fn fail(&self, op: ApiOp, failures: impl IntoIterator<Item = Failure>) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .extend(failures);
    }

    /// Queue failures for track reads and writes on one track only
    pub fn fail_track(&self, track: Track, failures: impl IntoIterator<Item = Failure>) {
        self.state()
            .track_failures
            .entry(track)
            .or_default()
            .extend(failures);
    }

    /// Make probes fail for this service account
    pub fn reject(&self, client_email: &str) {
        self.state().rejected.insert(client_email.to_string());
    }

    /// Pause the next call of `op` until the returned hold is released
    pub fn hold(&self, op: ApiOp) -> Arc<Hold> {
        self.hold_calls(op, 1)
    }

    /// Pause the next `calls` calls of `op` until the returned hold is released
    pub fn hold_calls(&self, op: ApiOp, calls: usize) -> Arc<Hold> {
        let hold = Arc::new(Hold::new());
        self.state().holds.insert(
            op,
            Armed {
                hold: hold.clone(),
                remaining: calls,
            },
        );
        hold
    }

    /// Committed releases of a track
    pub fn track(&self, package: &str, track: Track) -> Vec<TrackRelease> {
        self.state()
            .tracks
            .get(&(package.to_string(), track))
            .cloned()
            .unwrap_or_default()
    }

    pub fn listing(&self, package: &str, language: &str) -> Option<Listing> {
        self.state()
            .listings
            .get(&(package.to_string(), language.to_string()))
            .cloned()
    }

    /// Committed binaries of an app
    pub fn binaries(&self, package: &str) -> Vec<UploadedBinary> {
        self.state()
            .binaries
            .get(package)
            .map(|b| b.iter().map(|(_, binary)| binary.clone()).collect())
            .unwrap_or_default()
    }

    /// Edits opened and neither committed nor deleted
    pub fn open_edits(&self) -> usize {
        self.state().edits.len()
    }

    pub fn testers(&self, package: &str, track: Track) -> Option<Vec<String>> {
        self.state()
            .testers
            .get(&(package.to_string(), track))
            .cloned()
    }

    pub fn reviews(&self, package: &str) -> Vec<Review> {
        self.state()
            .reviews
            .get(package)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls of `op`
    pub fn count(&self, op: ApiOp) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    /// Record the call, wait on a hold if one is set, then pop a scripted failure
    async fn enter(
        &self,
        op: ApiOp,
        package: &str,
        credential: &Credential,
        track: Option<Track>,
    ) -> Option<Failure> {
        let hold = {
            let mut state = self.state();
            state.calls.push(RecordedCall {
                op,
                package: package.to_string(),
                track,
                client_email: credential.client_email().to_string(),
            });
            match state.holds.get_mut(&op) {
                Some(armed) => {
                    let hold = armed.hold.clone();
                    armed.remaining -= 1;
                    if armed.remaining == 0 {
                        state.holds.remove(&op);
                    }
                    Some(hold)
                }
                None => None,
            }
        };

        if let Some(hold) = hold {
            hold.park().await;
        }

        let mut state = self.state();
        if let Some(failure) = track.and_then(|t| state.track_failures.get_mut(&t)?.pop_front()) {
            return Some(failure);
        }
        state.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn edit_mut<'a>(state: &'a mut State, package: &str, edit_id: &str) -> Result<&'a mut Edit> {
        match state.edits.get_mut(edit_id) {
            Some(edit) if edit.package == package => Ok(edit),
            _ => Err(PublishError::from_status(
                404,
                format!("Edit {} not found", edit_id),
            )),
        }
    }
}

fn not_found(message: String) -> PublishError {
    PublishError::from_status(404, message)
}

fn before(failure: Option<Failure>) -> Result<Option<u16>> {
    match failure {
        Some(Failure::Status(status)) => Err(PublishError::from_status(status, "scripted failure")),
        Some(Failure::Transport) => Err(PublishError::transport("scripted connection reset")),
        Some(Failure::AfterApply(status)) => Ok(Some(status)),
        None => Ok(None),
    }
}

fn after<T>(lost: Option<u16>, value: T) -> Result<T> {
    match lost {
        Some(status) => Err(PublishError::from_status(status, "scripted lost response")),
        None => Ok(value),
    }
}

/// Fingerprint of an artifact file
pub fn sha256_file(path: &std::path::Path) -> String {
    let bytes = std::fs::read(path).unwrap_or_default();
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl CredentialProbe for ScriptedApi {
    async fn probe(&self, credential: &Credential) -> Result<()> {
        let lost = before(self.enter(ApiOp::Probe, "", credential, None).await)?;
        if self.state().rejected.contains(credential.client_email()) {
            return Err(PublishError::Auth {
                status: 401,
                message: "invalid_grant: Invalid JWT Signature.".to_string(),
            });
        }
        after(lost, ())
    }
}

#[async_trait]
impl PublisherApi for ScriptedApi {
    async fn insert_edit(&self, credential: &Credential, package: &str) -> Result<AppEdit> {
        let lost = before(self.enter(ApiOp::InsertEdit, package, credential, None).await)?;
        let mut state = self.state();
        state.next_edit += 1;
        let id = format!("edit-{}", state.next_edit);
        state.edits.insert(
            id.clone(),
            Edit {
                package: package.to_string(),
                ..Edit::default()
            },
        );
        after(
            lost,
            AppEdit {
                id,
                expiry_time_seconds: None,
            },
        )
    }

    async fn commit_edit(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<()> {
        let lost = before(self.enter(ApiOp::CommitEdit, package, credential, None).await)?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?;
        let Some(edit) = state.edits.remove(edit_id) else {
            return Err(PublishError::from_status(404, "edit vanished"));
        };

        for (track, releases) in edit.tracks {
            state.tracks.insert((package.to_string(), track), releases);
        }
        for (language, listing) in edit.listings {
            state.listings.insert((package.to_string(), language), listing);
        }
        for (track, groups) in edit.testers {
            state.testers.insert((package.to_string(), track), groups);
        }
        if let Some(pending) = state.pending_uploads.remove(edit_id) {
            state
                .binaries
                .entry(package.to_string())
                .or_default()
                .extend(pending);
        }
        after(lost, ())
    }

    async fn delete_edit(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<()> {
        let lost = before(self.enter(ApiOp::DeleteEdit, package, credential, None).await)?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?;
        state.edits.remove(edit_id);
        state.pending_uploads.remove(edit_id);
        after(lost, ())
    }

    async fn upload(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        artifact: &Artifact,
    ) -> Result<UploadedBinary> {
        let lost = before(self.enter(ApiOp::Upload, package, credential, None).await)?;
        let sha256 = sha256_file(&artifact.path);
        let mut state = self.state();

        let duplicate = state
            .binaries
            .get(package)
            .into_iter()
            .flatten()
            .chain(state.pending_uploads.get(edit_id).into_iter().flatten())
            .any(|(_, b)| b.sha256.as_deref() == Some(sha256.as_str()));
        if duplicate {
            return Err(PublishError::from_status(
                403,
                "APK specifies a version code that has already been used.",
            ));
        }

        Self::edit_mut(&mut state, package, edit_id)?;
        let version_code = state.next_version_code;
        state.next_version_code += 1;
        let binary = UploadedBinary {
            version_code,
            sha256: Some(sha256),
        };
        state
            .pending_uploads
            .entry(edit_id.to_string())
            .or_default()
            .push((artifact.kind, binary.clone()));
        after(lost, binary)
    }

    async fn list_uploads(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<UploadedBinary>> {
        let lost = before(self.enter(ApiOp::ListUploads, package, credential, None).await)?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?;
        let listed = state
            .binaries
            .get(package)
            .into_iter()
            .flatten()
            .chain(state.pending_uploads.get(edit_id).into_iter().flatten())
            .filter(|(k, _)| *k == kind)
            .map(|(_, b)| b.clone())
            .collect();
        after(lost, listed)
    }

    async fn get_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<TrackState> {
        let lost = before(
            self.enter(ApiOp::GetTrack, package, credential, Some(track))
                .await,
        )?;
        let mut state = self.state();
        let staged = Self::edit_mut(&mut state, package, edit_id)?
            .tracks
            .get(&track)
            .cloned();
        let releases = match staged {
            Some(releases) => releases,
            None => state
                .tracks
                .get(&(package.to_string(), track))
                .cloned()
                .unwrap_or_default(),
        };
        after(lost, TrackState::new(track, releases))
    }

    async fn update_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track_state: &TrackState,
    ) -> Result<TrackState> {
        let lost = before(
            self.enter(ApiOp::UpdateTrack, package, credential, Some(track_state.track))
                .await,
        )?;
        let mut state = self.state();
        let known: HashSet<i64> = state
            .binaries
            .get(package)
            .into_iter()
            .flatten()
            .chain(state.pending_uploads.get(edit_id).into_iter().flatten())
            .map(|(_, b)| b.version_code)
            .chain(
                state
                    .tracks
                    .iter()
                    .filter(|((p, _), _)| p == package)
                    .flat_map(|(_, releases)| releases.iter())
                    .flat_map(|r| r.version_codes.iter().copied()),
            )
            .collect();

        for release in &track_state.releases {
            if let Some(code) = release.version_codes.iter().find(|c| !known.contains(c)) {
                return Err(PublishError::from_status(
                    400,
                    format!("Version code {} has not been uploaded", code),
                ));
            }
        }

        let stored: Vec<TrackRelease> = track_state
            .releases
            .iter()
            .cloned()
            .map(|mut r| {
                if r.status == ReleaseStatus::Completed {
                    r.user_fraction = None;
                }
                r
            })
            .collect();
        Self::edit_mut(&mut state, package, edit_id)?
            .tracks
            .insert(track_state.track, stored.clone());
        after(lost, TrackState::new(track_state.track, stored))
    }

    async fn get_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        language: &str,
    ) -> Result<Listing> {
        let lost = before(self.enter(ApiOp::GetListing, package, credential, None).await)?;
        let mut state = self.state();
        let staged = Self::edit_mut(&mut state, package, edit_id)?
            .listings
            .get(language)
            .cloned();
        let listing = staged
            .or_else(|| {
                state
                    .listings
                    .get(&(package.to_string(), language.to_string()))
                    .cloned()
            })
            .ok_or_else(|| {
                PublishError::from_status(404, format!("No listing for language {}", language))
            })?;
        after(lost, listing)
    }

    async fn update_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        listing: &Listing,
    ) -> Result<Listing> {
        let lost = before(self.enter(ApiOp::UpdateListing, package, credential, None).await)?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?
            .listings
            .insert(listing.language.clone(), listing.clone());
        after(lost, listing.clone())
    }

    async fn get_details(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<AppDetailsRecord> {
        let lost = before(self.enter(ApiOp::GetDetails, package, credential, None).await)?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?;
        let details = state.details.get(package).cloned().unwrap_or_default();
        after(lost, details)
    }

    async fn list_listings(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<Vec<Listing>> {
        let lost = before(self.enter(ApiOp::ListListings, package, credential, None).await)?;
        let mut state = self.state();
        let staged = Self::edit_mut(&mut state, package, edit_id)?.listings.clone();
        let mut merged: HashMap<String, Listing> = state
            .listings
            .iter()
            .filter(|((p, _), _)| p == package)
            .map(|((_, language), listing)| (language.clone(), listing.clone()))
            .collect();
        merged.extend(staged);
        let mut listings: Vec<Listing> = merged.into_values().collect();
        listings.sort_by(|a, b| a.language.cmp(&b.language));
        after(lost, listings)
    }

    async fn get_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<Testers> {
        let lost = before(
            self.enter(ApiOp::GetTesters, package, credential, Some(track))
                .await,
        )?;
        let mut state = self.state();
        let staged = Self::edit_mut(&mut state, package, edit_id)?
            .testers
            .get(&track)
            .cloned();
        let groups = staged
            .or_else(|| state.testers.get(&(package.to_string(), track)).cloned())
            .ok_or_else(|| not_found(format!("No testers for track {}", track)))?;
        after(
            lost,
            Testers {
                track,
                google_groups: groups,
            },
        )
    }

    async fn update_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        testers: &Testers,
    ) -> Result<Testers> {
        let lost = before(
            self.enter(ApiOp::UpdateTesters, package, credential, Some(testers.track))
                .await,
        )?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?
            .testers
            .insert(testers.track, testers.google_groups.clone());
        after(lost, testers.clone())
    }

    async fn get_expansion_file(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> Result<ExpansionFile> {
        let lost = before(
            self.enter(ApiOp::GetExpansionFile, package, credential, None)
                .await,
        )?;
        let mut state = self.state();
        Self::edit_mut(&mut state, package, edit_id)?;
        let file = state
            .expansion_files
            .get(&(package.to_string(), version_code, file_type))
            .cloned()
            .ok_or_else(|| {
                not_found(format!("No {} expansion file for {}", file_type, version_code))
            })?;
        after(lost, file)
    }

    async fn list_apps(&self, credential: &Credential) -> Result<Vec<AppInfo>> {
        let lost = before(self.enter(ApiOp::ListApps, "", credential, None).await)?;
        let apps = self.state().apps.clone();
        after(lost, apps)
    }

    async fn list_reviews(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
        start_index: u32,
    ) -> Result<Vec<Review>> {
        let lost = before(self.enter(ApiOp::ListReviews, package, credential, None).await)?;
        let page = self
            .state()
            .reviews
            .get(package)
            .into_iter()
            .flatten()
            .skip(start_index as usize)
            .take(max_results as usize)
            .cloned()
            .collect();
        after(lost, page)
    }

    async fn reply_to_review(
        &self,
        credential: &Credential,
        package: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<ReviewReply> {
        let lost = before(self.enter(ApiOp::ReplyToReview, package, credential, None).await)?;
        let mut state = self.state();
        let review = state
            .reviews
            .get_mut(package)
            .and_then(|reviews| reviews.iter_mut().find(|r| r.review_id == review_id))
            .ok_or_else(|| not_found(format!("Review {} not found", review_id)))?;
        let now = Utc::now();
        review.developer_reply = Some(reply_text.to_string());
        review.developer_reply_time = Some(now);
        after(
            lost,
            ReviewReply {
                review_id: review_id.to_string(),
                reply_text: reply_text.to_string(),
                last_edited: Some(now),
                message: "Reply posted successfully".to_string(),
            },
        )
    }

    async fn query_vitals(
        &self,
        credential: &Credential,
        package: &str,
        metric: VitalsMetricKind,
        dimension: Option<&str>,
    ) -> Result<VitalsReport> {
        let lost = before(self.enter(ApiOp::QueryVitals, package, credential, None).await)?;
        let report = self
            .state()
            .vitals
            .get(&(package.to_string(), metric))
            .map(|report| VitalsReport {
                freshness: report.freshness.clone(),
                rows: report
                    .rows
                    .iter()
                    .filter(|row| row.dimension_value.is_some() == dimension.is_some())
                    .cloned()
                    .collect(),
            })
            .unwrap_or_default();
        after(lost, report)
    }

    async fn list_subscriptions(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<SubscriptionProduct>> {
        let lost = before(
            self.enter(ApiOp::ListSubscriptions, package, credential, None)
                .await,
        )?;
        let products = self
            .state()
            .subscriptions
            .get(package)
            .cloned()
            .unwrap_or_default();
        after(lost, products)
    }

    async fn get_subscription_purchase(
        &self,
        credential: &Credential,
        package: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionPurchase> {
        let lost = before(
            self.enter(ApiOp::GetSubscriptionPurchase, package, credential, None)
                .await,
        )?;
        let purchase = self
            .state()
            .purchases
            .get(&(package.to_string(), token.to_string()))
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .ok_or_else(|| not_found("Purchase token not found".to_string()))?;
        after(lost, purchase)
    }

    async fn list_voided_purchases(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
    ) -> Result<Vec<VoidedPurchase>> {
        let lost = before(
            self.enter(ApiOp::ListVoidedPurchases, package, credential, None)
                .await,
        )?;
        let voided = self
            .state()
            .voided
            .get(package)
            .into_iter()
            .flatten()
            .take(max_results as usize)
            .cloned()
            .collect();
        after(lost, voided)
    }

    async fn list_in_app_products(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<InAppProduct>> {
        let lost = before(
            self.enter(ApiOp::ListInAppProducts, package, credential, None)
                .await,
        )?;
        let products = self
            .state()
            .products
            .get(package)
            .cloned()
            .unwrap_or_default();
        after(lost, products)
    }

    async fn get_in_app_product(
        &self,
        credential: &Credential,
        package: &str,
        sku: &str,
    ) -> Result<InAppProduct> {
        let lost = before(
            self.enter(ApiOp::GetInAppProduct, package, credential, None)
                .await,
        )?;
        let product = self
            .state()
            .products
            .get(package)
            .and_then(|products| products.iter().find(|p| p.sku == sku))
            .cloned()
            .ok_or_else(|| not_found(format!("Product {} not found", sku)))?;
        after(lost, product)
    }

    async fn get_order(
        &self,
        credential: &Credential,
        package: &str,
        order_id: &str,
    ) -> Result<Order> {
        let lost = before(self.enter(ApiOp::GetOrder, package, credential, None).await)?;
        let order = self
            .state()
            .orders
            .get(&(package.to_string(), order_id.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("Order {} not found", order_id)))?;
        after(lost, order)
    }
}
