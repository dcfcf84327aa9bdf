//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::{
    DEFAULT_API_BASE_URL, DEFAULT_HOST, DEFAULT_LANGUAGE, DEFAULT_PORT, DEFAULT_REPORTING_URL,
    DEFAULT_TOKEN_URL, DEFAULT_UPLOAD_URL,
};

/// Main configuration for playdeck
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Version of the config schema
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Credential source used to seed the credential store
    pub credentials: CredentialsConfig,

    /// Retry/backoff settings for remote calls
    pub retry: RetryConfig,

    /// Remote API endpoints
    pub api: ApiConfig,

    /// HTTP server for the credential endpoint
    pub server: ServerConfig,

    /// Release defaults
    pub release: ReleaseConfig,
}

/// Where the initial service-account credential comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path to a service account JSON key file
    pub path: Option<PathBuf>,

    /// Service account JSON content
    pub json: Option<String>,
}

impl CredentialsConfig {
    /// Whether any credential source is configured
    pub fn is_configured(&self) -> bool {
        self.path.is_some() || self.json.is_some()
    }

    /// Apply a CLI/env value: inline JSON if it looks like an object, else a path
    pub fn apply_override(&mut self, value: &str) {
        if value.trim_start().starts_with('{') {
            self.json = Some(value.to_string());
            self.path = None;
        } else {
            self.path = Some(PathBuf::from(value));
            self.json = None;
        }
    }
}

/// Retry/backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound for the exponential delay, in milliseconds
    pub max_delay_ms: u64,

    /// Add uniform random jitter on top of the delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 32_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the publisher API
    pub base_url: String,

    /// Base URL for binary uploads
    pub upload_url: String,

    /// OAuth token endpoint used when the key does not name one
    pub token_url: String,

    /// Base URL of the Play Developer Reporting API (vitals, app search)
    pub reporting_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            reporting_url: DEFAULT_REPORTING_URL.to_string(),
            timeout_secs: 120,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Release defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Language used when release notes are a single string
    pub default_language: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_override() {
        let mut creds = CredentialsConfig::default();
        assert!(!creds.is_configured());

        creds.apply_override("/keys/play.json");
        assert_eq!(creds.path, Some(PathBuf::from("/keys/play.json")));

        creds.apply_override("  {\"type\": \"service_account\"}");
        assert!(creds.json.is_some());
        assert!(creds.path.is_none());
        assert!(creds.is_configured());
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.base_delay(), Duration::from_secs(1));
        assert_eq!(retry.max_delay(), Duration::from_secs(32));
    }
}
