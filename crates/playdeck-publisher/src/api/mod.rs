//! Remote API seam
//!
//! [`PublisherApi`] is the boundary to the Google Play Developer API and the
//! Play Developer Reporting API. Every method takes the credential
//! explicitly and returns typed records; failures are classified into
//! [`PublishError`](playdeck_core::PublishError) before they leave the
//! implementation.

mod commerce;
mod google_play;
mod insights;
mod records;

pub use google_play::GooglePlayApi;
pub use insights::{VitalsReport, VitalsRow};
pub use records::*;

use async_trait::async_trait;
use playdeck_core::{
    AppInfo, Artifact, ArtifactKind, ExpansionFile, ExpansionFileType, InAppProduct, Listing,
    Order, Result, Review, ReviewReply, SubscriptionProduct, SubscriptionPurchase, Testers, Track,
    VitalsMetricKind, VoidedPurchase,
};

use crate::credentials::Credential;

/// Operations against the remote publishing service
#[async_trait]
pub trait PublisherApi: Send + Sync {
    /// Open an edit transaction for an app
    async fn insert_edit(&self, credential: &Credential, package: &str) -> Result<AppEdit>;

    /// Commit an edit, publishing its changes
    async fn commit_edit(&self, credential: &Credential, package: &str, edit_id: &str)
        -> Result<()>;

    /// Discard an edit
    async fn delete_edit(&self, credential: &Credential, package: &str, edit_id: &str)
        -> Result<()>;

    /// Upload an artifact into an edit
    async fn upload(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        artifact: &Artifact,
    ) -> Result<UploadedBinary>;

    /// Binaries of the given kind visible to an edit
    async fn list_uploads(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<UploadedBinary>>;

    async fn get_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<TrackState>;

    /// Replace the releases of a track, returning the stored state
    async fn update_track(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        state: &TrackState,
    ) -> Result<TrackState>;

    async fn get_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        language: &str,
    ) -> Result<Listing>;

    async fn update_listing(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        listing: &Listing,
    ) -> Result<Listing>;

    async fn get_details(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<AppDetailsRecord>;

    /// Listings of every language staged in or committed before the edit
    async fn list_listings(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
    ) -> Result<Vec<Listing>>;

    async fn get_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        track: Track,
    ) -> Result<Testers>;

    /// Replace the tester groups of a track
    async fn update_testers(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        testers: &Testers,
    ) -> Result<Testers>;

    async fn get_expansion_file(
        &self,
        credential: &Credential,
        package: &str,
        edit_id: &str,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> Result<ExpansionFile>;

    /// Apps the service account can see
    async fn list_apps(&self, credential: &Credential) -> Result<Vec<AppInfo>>;

    /// One page of reviews; reviews without user text are left out
    async fn list_reviews(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
        start_index: u32,
    ) -> Result<Vec<Review>>;

    /// Post or replace the developer reply to a review
    async fn reply_to_review(
        &self,
        credential: &Credential,
        package: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<ReviewReply>;

    /// Latest daily values of a vitals metric, optionally per dimension value
    async fn query_vitals(
        &self,
        credential: &Credential,
        package: &str,
        metric: VitalsMetricKind,
        dimension: Option<&str>,
    ) -> Result<VitalsReport>;

    async fn list_subscriptions(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<SubscriptionProduct>>;

    async fn get_subscription_purchase(
        &self,
        credential: &Credential,
        package: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionPurchase>;

    async fn list_voided_purchases(
        &self,
        credential: &Credential,
        package: &str,
        max_results: u32,
    ) -> Result<Vec<VoidedPurchase>>;

    async fn list_in_app_products(
        &self,
        credential: &Credential,
        package: &str,
    ) -> Result<Vec<InAppProduct>>;

    async fn get_in_app_product(
        &self,
        credential: &Credential,
        package: &str,
        sku: &str,
    ) -> Result<InAppProduct>;

    async fn get_order(&self, credential: &Credential, package: &str, order_id: &str)
        -> Result<Order>;
}
