//! playdeck core - shared types for app release orchestration
//!
//! This crate provides the release data model, review, vitals and commerce
//! records, the error taxonomy, pre-flight input validation and configuration
//! loading. Nothing in here touches the network.

pub mod commerce;
pub mod config;
pub mod error;
pub mod insights;
pub mod types;
pub mod validation;

pub use error::{ConfigError, ErrorClass, ErrorKind, FailureDetail, PublishError, Result};
pub use commerce::{
    BasePlan, InAppProduct, Order, Price, SubscriptionProduct, SubscriptionPurchase,
    VoidedPurchase,
};
pub use insights::{AppInfo, Review, ReviewReply, VitalsMetric, VitalsMetricKind, VitalsOverview};
pub use types::{
    AppDetails, Artifact, ArtifactKind, BatchDeploymentResult, BatchSummary, DeploymentResult,
    ExpansionFile, ExpansionFileType, Listing, ListingUpdate, Release, ReleaseNotes,
    ReleaseStatus, RolloutPercentage, Testers, Track, TrackOutcome, TrackReleases, TrackSummary,
};
pub use validation::{ValidationIssue, ValidationReport};
