//! Configuration validation

use tracing::debug;

use crate::error::ConfigError;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    debug!("validating configuration");
    validate_retry(config)?;
    validate_api(config)?;
    validate_server(config)?;
    validate_release(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_retry(config: &Config) -> Result<(), ConfigError> {
    if config.retry.base_delay_ms == 0 {
        return Err(invalid("retry.base_delay_ms", "must be greater than zero"));
    }

    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        return Err(invalid(
            "retry.max_delay_ms",
            "must be greater than or equal to retry.base_delay_ms",
        ));
    }

    Ok(())
}

fn validate_api(config: &Config) -> Result<(), ConfigError> {
    let urls = [
        ("api.base_url", &config.api.base_url),
        ("api.upload_url", &config.api.upload_url),
        ("api.token_url", &config.api.token_url),
        ("api.reporting_url", &config.api.reporting_url),
    ];
    for (field, url) in urls {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(invalid(field, "must be an http(s) URL"));
        }
    }

    if config.api.timeout_secs == 0 {
        return Err(invalid("api.timeout_secs", "must be greater than zero"));
    }

    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ConfigError> {
    if config.server.host.is_empty() {
        return Err(invalid("server.host", "host cannot be empty"));
    }

    if config.server.port == 0 {
        return Err(invalid("server.port", "port cannot be zero"));
    }

    Ok(())
}

fn validate_release(config: &Config) -> Result<(), ConfigError> {
    if config.release.default_language.trim().is_empty() {
        return Err(invalid(
            "release.default_language",
            "default language cannot be empty",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_delay_bounds() {
        let mut config = Config::default();
        config.retry.max_delay_ms = 10;
        config.retry.base_delay_ms = 100;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_api_url() {
        let mut config = Config::default();
        config.api.base_url = "androidpublisher.googleapis.com".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
    }

    #[test]
    fn test_validate_server_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }
}
