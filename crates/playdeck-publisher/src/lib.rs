//! Google Play release orchestration for playdeck
//!
//! This crate drives the Play Developer API edit workflow: every change is
//! staged in an edit and committed as one unit.
//!
//! ## Layers
//!
//! - **credentials**: hot-swappable service account credential store
//! - **retry**: exponential backoff with jitter for transient failures
//! - **api**: the remote surface ([`PublisherApi`]) and its HTTP implementation
//! - **client**: binds the API to the credential store and retry policy
//! - **release**: deploy, promote, halt, rollout and batch operations, plus
//!   track testers and expansion files
//! - **listing**: store listings and app details
//! - **insights**: reviews, review replies, Android vitals and app discovery
//! - **commerce**: subscriptions, purchases, in-app products and orders
//!
//! ## Usage
//!
//! ```ignore
//! use playdeck_publisher::{ApiClient, CredentialStore, GooglePlayApi, ReleaseManager, RetryPolicy};
//!
//! let api = Arc::new(GooglePlayApi::new(&config.api)?);
//! let store = Arc::new(CredentialStore::initialize(&config.credentials, api.clone())?);
//! let client = ApiClient::new(api, store, RetryPolicy::from_config(&config.retry));
//! let releases = ReleaseManager::new(client, "en-US");
//! releases.halt("com.example.app", "production", 42).await?;
//! ```

pub mod api;
pub mod client;
pub mod commerce;
pub mod credentials;
pub mod insights;
pub mod listing;
pub mod locks;
pub mod release;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{GooglePlayApi, PublisherApi};
pub use client::{ApiClient, ApiSession};
pub use commerce::CommerceManager;
pub use credentials::{Credential, CredentialProbe, CredentialSource, CredentialStore, ServiceAccountKey};
pub use insights::InsightsManager;
pub use listing::ListingManager;
pub use release::{
    BatchDeployRequest, DeployRequest, PromoteRequest, ReleaseManager, ReleaseNotesInput,
    TestersUpdate,
};
pub use retry::{Jitter, RetryPolicy};
