//! Store listing and app details

use playdeck_core::validation::{validate_listing_text, validate_package_name};
use playdeck_core::{AppDetails, Listing, ListingUpdate, PublishError, Result};
use tracing::{debug, info};

use crate::client::{ApiClient, ApiSession};

/// Reads and edits store listings
#[derive(Clone)]
pub struct ListingManager {
    client: ApiClient,
}

impl ListingManager {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Listing for one language
    pub async fn get_listing(&self, package_name: &str, language: &str) -> Result<Listing> {
        validate_package_name(package_name).into_result()?;

        let session = self.client.session();
        let edit = session
            .retrying("insert_edit", |_| session.insert_edit(package_name))
            .await?;
        let listing = session
            .retrying("get_listing", |_| {
                session.get_listing(package_name, &edit.id, language)
            })
            .await;
        session.discard_edit(package_name, &edit.id).await;
        listing
    }

    /// Listings of every language the app is published in
    pub async fn list_all_listings(&self, package_name: &str) -> Result<Vec<Listing>> {
        validate_package_name(package_name).into_result()?;

        let session = self.client.session();
        let edit = session
            .retrying("insert_edit", |_| session.insert_edit(package_name))
            .await?;
        let listings = session
            .retrying("list_listings", |_| session.list_listings(package_name, &edit.id))
            .await;
        session.discard_edit(package_name, &edit.id).await;
        listings
    }

    /// Apply a partial listing update.
    ///
    /// Fields left as `None` keep their current value. Length limits are
    /// checked before anything is sent.
    pub async fn update_listing(
        &self,
        package_name: &str,
        language: &str,
        update: &ListingUpdate,
    ) -> Result<Listing> {
        let mut report = validate_package_name(package_name);
        report.merge(validate_listing_text(
            update.title.as_deref(),
            update.short_description.as_deref(),
            update.full_description.as_deref(),
        ));
        report.into_result()?;

        info!(package = package_name, language, "updating listing");

        let session = self.client.session();
        let listing = session
            .retrying("update_listing", |_| {
                self.update_attempt(&session, package_name, language, update)
            })
            .await?;

        info!(package = package_name, language, "listing updated");
        Ok(listing)
    }

    async fn update_attempt(
        &self,
        session: &ApiSession,
        package: &str,
        language: &str,
        update: &ListingUpdate,
    ) -> Result<Listing> {
        let edit = session.insert_edit(package).await?;

        let staged = async {
            let current = match session.get_listing(package, &edit.id, language).await {
                Ok(listing) => listing,
                Err(PublishError::NotFound { .. }) => {
                    debug!(package, language, "no listing yet, creating");
                    Listing {
                        language: language.to_string(),
                        ..Listing::default()
                    }
                }
                Err(e) => return Err(e),
            };
            let merged = merge(current, update);
            session.update_listing(package, &edit.id, &merged).await
        }
        .await;

        match staged {
            Ok(listing) => match session.commit_edit(package, &edit.id).await {
                Ok(()) => Ok(listing),
                Err(e) => {
                    session.discard_edit(package, &edit.id).await;
                    Err(e)
                }
            },
            Err(e) => {
                session.discard_edit(package, &edit.id).await;
                Err(e)
            }
        }
    }

    /// App details combined with the listing for `language`.
    ///
    /// A missing listing leaves the text fields empty.
    pub async fn get_app_details(&self, package_name: &str, language: &str) -> Result<AppDetails> {
        validate_package_name(package_name).into_result()?;

        let session = self.client.session();
        let edit = session
            .retrying("insert_edit", |_| session.insert_edit(package_name))
            .await?;

        let details = async {
            let record = session
                .retrying("get_details", |_| session.get_details(package_name, &edit.id))
                .await?;
            let listing = match session
                .retrying("get_listing", |_| {
                    session.get_listing(package_name, &edit.id, language)
                })
                .await
            {
                Ok(listing) => Some(listing),
                Err(PublishError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            Ok::<_, PublishError>(record.into_details(package_name, listing))
        }
        .await;

        session.discard_edit(package_name, &edit.id).await;
        details
    }
}

fn merge(mut listing: Listing, update: &ListingUpdate) -> Listing {
    if let Some(title) = &update.title {
        listing.title = Some(title.clone());
    }
    if let Some(short) = &update.short_description {
        listing.short_description = Some(short.clone());
    }
    if let Some(full) = &update.full_description {
        listing.full_description = Some(full.clone());
    }
    if let Some(video) = &update.video {
        listing.video = Some(video.clone());
    }
    listing
}
