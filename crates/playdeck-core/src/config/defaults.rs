//! Default configuration values

use super::types::Config;

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "playdeck.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "playdeck.yaml";

/// Base URL for the Google Play Developer API v3
pub const DEFAULT_API_BASE_URL: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3";

/// Base URL for binary uploads
pub const DEFAULT_UPLOAD_URL: &str =
    "https://androidpublisher.googleapis.com/upload/androidpublisher/v3";

/// Base URL for the Play Developer Reporting API
pub const DEFAULT_REPORTING_URL: &str = "https://playdeveloperreporting.googleapis.com/v1beta1";

/// OAuth 2.0 token endpoint for Google
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Default bind address for the credential endpoint
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port for the credential endpoint
pub const DEFAULT_PORT: u16 = 8000;

/// Default release notes language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".playdeck.toml",
        ".playdeck.yaml",
    ]
}

/// Generate default configuration TOML
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| DEFAULT_CONFIG_TEMPLATE.to_string())
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# playdeck configuration

[credentials]
# path = "service-account.json"

[retry]
max_retries = 3
base_delay_ms = 1000
max_delay_ms = 32000
jitter = true

[api]
base_url = "https://androidpublisher.googleapis.com/androidpublisher/v3"
upload_url = "https://androidpublisher.googleapis.com/upload/androidpublisher/v3"
token_url = "https://oauth2.googleapis.com/token"
reporting_url = "https://playdeveloperreporting.googleapis.com/v1beta1"
timeout_secs = 120

[server]
host = "0.0.0.0"
port = 8000

[release]
default_language = "en-US"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.retry.max_delay_ms, 32_000);
    }

    #[test]
    fn test_default_config_roundtrips() {
        let rendered = default_config_toml();
        let config: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
    }
}
