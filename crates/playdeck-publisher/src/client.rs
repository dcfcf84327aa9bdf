//! API client bound to the credential store and retry policy

use std::future::Future;
use std::sync::Arc;

use playdeck_core::{
    AppInfo, Artifact, ArtifactKind, ExpansionFile, ExpansionFileType, InAppProduct, Listing,
    Order, Result, Review, ReviewReply, SubscriptionProduct, SubscriptionPurchase, Testers, Track,
    VitalsMetricKind, VoidedPurchase,
};
use tracing::{debug, warn};

use crate::api::{
    AppDetailsRecord, AppEdit, PublisherApi, TrackState, UploadedBinary, VitalsReport,
};
use crate::credentials::{Credential, CredentialStore};
use crate::retry::RetryPolicy;

/// Issues remote calls with whatever credential the store currently holds
#[derive(Clone)]
pub struct ApiClient {
    api: Arc<dyn PublisherApi>,
    credentials: Arc<CredentialStore>,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(
        api: Arc<dyn PublisherApi>,
        credentials: Arc<CredentialStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            credentials,
            retry,
        }
    }

    /// Start one logical operation.
    ///
    /// The session captures the current credential once; every call it makes,
    /// retries included, uses that snapshot even if a swap lands meanwhile.
    pub fn session(&self) -> ApiSession {
        let credential = self.credentials.get();
        debug!(client_email = credential.client_email(), "api session started");
        ApiSession {
            api: self.api.clone(),
            credential,
            retry: self.retry.clone(),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// One logical operation's view of the remote service
#[derive(Clone)]
pub struct ApiSession {
    api: Arc<dyn PublisherApi>,
    credential: Arc<Credential>,
    retry: RetryPolicy,
}

impl ApiSession {
    /// Credential snapshot used by this session
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Apply the retry policy to `call`
    pub async fn retrying<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.retry.run(operation, call).await
    }

    pub async fn insert_edit(&self, package: &str) -> Result<AppEdit> {
        let edit = self.api.insert_edit(&self.credential, package).await?;
        debug!(package, edit_id = %edit.id, "edit opened");
        Ok(edit)
    }

    pub async fn commit_edit(&self, package: &str, edit_id: &str) -> Result<()> {
        self.api
            .commit_edit(&self.credential, package, edit_id)
            .await?;
        debug!(package, edit_id, "edit committed");
        Ok(())
    }

    /// Delete an edit, logging instead of failing
    pub async fn discard_edit(&self, package: &str, edit_id: &str) {
        match self.api.delete_edit(&self.credential, package, edit_id).await {
            Ok(()) => debug!(package, edit_id, "edit discarded"),
            Err(e) => warn!(package, edit_id, error = %e, "failed to delete edit"),
        }
    }

    pub async fn upload(
        &self,
        package: &str,
        edit_id: &str,
        artifact: &Artifact,
    ) -> Result<UploadedBinary> {
        self.api
            .upload(&self.credential, package, edit_id, artifact)
            .await
    }

    pub async fn list_uploads(
        &self,
        package: &str,
        edit_id: &str,
        kind: ArtifactKind,
    ) -> Result<Vec<UploadedBinary>> {
        self.api
            .list_uploads(&self.credential, package, edit_id, kind)
            .await
    }

    pub async fn get_track(&self, package: &str, edit_id: &str, track: Track) -> Result<TrackState> {
        self.api
            .get_track(&self.credential, package, edit_id, track)
            .await
    }

    pub async fn update_track(
        &self,
        package: &str,
        edit_id: &str,
        state: &TrackState,
    ) -> Result<TrackState> {
        self.api
            .update_track(&self.credential, package, edit_id, state)
            .await
    }

    pub async fn get_listing(&self, package: &str, edit_id: &str, language: &str) -> Result<Listing> {
        self.api
            .get_listing(&self.credential, package, edit_id, language)
            .await
    }

    pub async fn update_listing(
        &self,
        package: &str,
        edit_id: &str,
        listing: &Listing,
    ) -> Result<Listing> {
        self.api
            .update_listing(&self.credential, package, edit_id, listing)
            .await
    }

    pub async fn get_details(&self, package: &str, edit_id: &str) -> Result<AppDetailsRecord> {
        self.api
            .get_details(&self.credential, package, edit_id)
            .await
    }

    pub async fn list_listings(&self, package: &str, edit_id: &str) -> Result<Vec<Listing>> {
        self.api
            .list_listings(&self.credential, package, edit_id)
            .await
    }

    pub async fn get_testers(&self, package: &str, edit_id: &str, track: Track) -> Result<Testers> {
        self.api
            .get_testers(&self.credential, package, edit_id, track)
            .await
    }

    pub async fn update_testers(
        &self,
        package: &str,
        edit_id: &str,
        testers: &Testers,
    ) -> Result<Testers> {
        self.api
            .update_testers(&self.credential, package, edit_id, testers)
            .await
    }

    pub async fn get_expansion_file(
        &self,
        package: &str,
        edit_id: &str,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> Result<ExpansionFile> {
        self.api
            .get_expansion_file(&self.credential, package, edit_id, version_code, file_type)
            .await
    }

    pub async fn list_apps(&self) -> Result<Vec<AppInfo>> {
        self.api.list_apps(&self.credential).await
    }

    pub async fn list_reviews(
        &self,
        package: &str,
        max_results: u32,
        start_index: u32,
    ) -> Result<Vec<Review>> {
        self.api
            .list_reviews(&self.credential, package, max_results, start_index)
            .await
    }

    pub async fn reply_to_review(
        &self,
        package: &str,
        review_id: &str,
        reply_text: &str,
    ) -> Result<ReviewReply> {
        self.api
            .reply_to_review(&self.credential, package, review_id, reply_text)
            .await
    }

    pub async fn query_vitals(
        &self,
        package: &str,
        metric: VitalsMetricKind,
        dimension: Option<&str>,
    ) -> Result<VitalsReport> {
        self.api
            .query_vitals(&self.credential, package, metric, dimension)
            .await
    }

    pub async fn list_subscriptions(&self, package: &str) -> Result<Vec<SubscriptionProduct>> {
        self.api.list_subscriptions(&self.credential, package).await
    }

    pub async fn get_subscription_purchase(
        &self,
        package: &str,
        subscription_id: &str,
        token: &str,
    ) -> Result<SubscriptionPurchase> {
        self.api
            .get_subscription_purchase(&self.credential, package, subscription_id, token)
            .await
    }

    pub async fn list_voided_purchases(
        &self,
        package: &str,
        max_results: u32,
    ) -> Result<Vec<VoidedPurchase>> {
        self.api
            .list_voided_purchases(&self.credential, package, max_results)
            .await
    }

    pub async fn list_in_app_products(&self, package: &str) -> Result<Vec<InAppProduct>> {
        self.api.list_in_app_products(&self.credential, package).await
    }

    pub async fn get_in_app_product(&self, package: &str, sku: &str) -> Result<InAppProduct> {
        self.api
            .get_in_app_product(&self.credential, package, sku)
            .await
    }

    pub async fn get_order(&self, package: &str, order_id: &str) -> Result<Order> {
        self.api.get_order(&self.credential, package, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::test_credential;
    use crate::testing::{ApiOp, ScriptedApi};

    #[tokio::test]
    async fn test_session_keeps_snapshot_across_swap() {
        let api = Arc::new(ScriptedApi::new());
        let store = Arc::new(CredentialStore::new(test_credential("old@example.com"), api.clone()));
        let client = ApiClient::new(api.clone(), store.clone(), RetryPolicy::no_retry());

        let in_flight = client.session();
        store.swap(test_credential("new@example.com")).await.unwrap();

        in_flight.insert_edit("com.example.app").await.unwrap();
        client.session().insert_edit("com.example.app").await.unwrap();

        let emails: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.op != ApiOp::Probe)
            .map(|c| c.client_email)
            .collect();
        assert_eq!(emails, vec!["old@example.com", "new@example.com"]);
    }
}
