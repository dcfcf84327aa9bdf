//! Configuration and service wiring shared by commands

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use playdeck_core::config::{load_config, load_config_or_default, Config};
use playdeck_publisher::{
    ApiClient, CommerceManager, CredentialStore, GooglePlayApi, InsightsManager, ListingManager,
    ReleaseManager, RetryPolicy,
};
use tracing::debug;

use crate::cli::Cli;

/// Resolve configuration from `--config`, the nearest config file or defaults.
///
/// `--credentials` (or its environment variables) overrides the configured
/// credential source.
pub fn load(cli: &Cli) -> anyhow::Result<(Config, Option<PathBuf>)> {
    let (mut config, path) = match &cli.config {
        Some(path) => (
            load_config(path).map_err(playdeck_core::PublishError::from)?,
            Some(path.clone()),
        ),
        None => {
            let cwd = std::env::current_dir()?;
            load_config_or_default(&cwd).map_err(playdeck_core::PublishError::from)?
        }
    };

    if let Some(value) = credential_override(cli) {
        config.credentials.apply_override(&value);
    }

    debug!(config = ?path, "configuration loaded");
    Ok((config, path))
}

/// `--credentials`, then `GOOGLE_APPLICATION_CREDENTIALS`
fn credential_override(cli: &Cli) -> Option<String> {
    cli.credentials
        .clone()
        .or_else(|| std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok())
        .filter(|v| !v.trim().is_empty())
}

/// Everything a remote command needs
pub struct Services {
    pub config: Config,
    pub client: ApiClient,
    pub store: Arc<CredentialStore>,
    pub releases: ReleaseManager,
    pub listings: ListingManager,
    pub insights: InsightsManager,
    pub commerce: CommerceManager,
}

impl Services {
    pub fn build(cli: &Cli) -> anyhow::Result<Self> {
        let (config, _) = load(cli)?;

        let api = Arc::new(GooglePlayApi::new(&config.api)?);
        let store = Arc::new(
            CredentialStore::initialize(&config.credentials, api.clone())
                .context("Failed to load service account credentials")?,
        );
        let client = ApiClient::new(api, store.clone(), RetryPolicy::from_config(&config.retry));

        Ok(Self {
            releases: ReleaseManager::new(client.clone(), config.release.default_language.clone()),
            listings: ListingManager::new(client.clone()),
            insights: InsightsManager::new(client.clone()),
            commerce: CommerceManager::new(client.clone()),
            client,
            store,
            config,
        })
    }
}

/// Runtime for async commands
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}
