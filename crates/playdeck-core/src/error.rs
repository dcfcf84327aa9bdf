//! Error types for playdeck
//!
//! Remote failures are classified exactly once, where the HTTP response (or
//! transport failure) is first observed, and the [`ErrorClass`] travels
//! unchanged through retry wrapping and per-track aggregation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ReleaseStatus;
use crate::validation::{ValidationIssue, ValidationReport};

/// Result type alias using PublishError
pub type Result<T> = std::result::Result<T, PublishError>;

/// Classification of a remote call outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// 429 Too Many Requests
    RateLimited,
    /// 500 Internal Server Error
    ServerError,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// Connection, TLS or timeout failure before a status was received
    Transport,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// Any other non-success status
    Other,
}

impl ErrorClass {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            500 => Self::ServerError,
            503 => Self::ServiceUnavailable,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::Other,
        }
    }

    /// Whether a call failing with this class may be repeated after a backoff
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::ServiceUnavailable | Self::Transport
        )
    }

    /// Returns the string representation of the class
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Transport => "transport",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for publishing operations
#[derive(Debug, Error)]
pub enum PublishError {
    /// Input failed a pre-flight check; no remote call was made
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// The remote service rejected the credential (401/403)
    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// A remote resource (404) or a referenced version is absent
    #[error("Not found: {message}")]
    NotFound { status: Option<u16>, message: String },

    /// The remote service rejected the request shape (400)
    #[error("Bad request ({status}): {message}")]
    BadRequest { status: u16, message: String },

    /// A transient remote failure (429/500/503/transport)
    #[error("Service error [{class}]: {message}")]
    Service {
        class: ErrorClass,
        status: Option<u16>,
        message: String,
    },

    /// The retry budget was spent; `last` keeps the final classified error
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<PublishError>,
    },

    /// A release operation was attempted from a status that does not permit it
    #[error("Cannot {operation} version {version_code}: release is {status}")]
    InvalidState {
        operation: &'static str,
        version_code: i64,
        status: ReleaseStatus,
    },

    /// The candidate credential cannot authenticate; the previous credential stays active
    #[error("Credential swap rejected: {0}")]
    CredentialSwap(String),

    /// The candidate credential could not be checked because the service
    /// failed; the previous credential stays active
    #[error("Credential check failed: {0}")]
    CredentialCheck(Box<PublishError>),

    /// Credential could not be loaded or parsed
    #[error("Invalid credentials: {0}")]
    Credential(String),

    /// Any other fatal remote status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    /// Build a classified error from a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let class = ErrorClass::from_status(status);
        match class {
            ErrorClass::Unauthorized | ErrorClass::Forbidden => Self::Auth { status, message },
            ErrorClass::NotFound => Self::NotFound {
                status: Some(status),
                message,
            },
            ErrorClass::BadRequest => Self::BadRequest { status, message },
            ErrorClass::RateLimited | ErrorClass::ServerError | ErrorClass::ServiceUnavailable => {
                Self::Service {
                    class,
                    status: Some(status),
                    message,
                }
            }
            ErrorClass::Transport | ErrorClass::Other => Self::Api { status, message },
        }
    }

    /// Build a transport-level (no status received) error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Service {
            class: ErrorClass::Transport,
            status: None,
            message: message.into(),
        }
    }

    /// Build a local "absent version/app" error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            status: None,
            message: message.into(),
        }
    }

    /// Classification of a remote-origin error, `None` for local errors.
    ///
    /// For `RetriesExhausted` this is the class of the last underlying error.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Auth { status, .. } | Self::BadRequest { status, .. } | Self::Api { status, .. } => {
                Some(ErrorClass::from_status(*status))
            }
            Self::NotFound { status, .. } => status.map(ErrorClass::from_status),
            Self::Service { class, .. } => Some(*class),
            Self::RetriesExhausted { last, .. } | Self::CredentialCheck(last) => last.class(),
            _ => None,
        }
    }

    /// Whether the retry policy may repeat the failed call
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service { class, .. } => class.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status associated with the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::BadRequest { status, .. } | Self::Api { status, .. } => {
                Some(*status)
            }
            Self::NotFound { status, .. } | Self::Service { status, .. } => *status,
            Self::RetriesExhausted { last, .. } | Self::CredentialCheck(last) => last.status(),
            _ => None,
        }
    }

    /// Flat kind used in user-visible outcomes
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BadRequest { .. } => ErrorKind::BadRequest,
            Self::Service { .. } => ErrorKind::RetryableService,
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::CredentialSwap(_) => ErrorKind::CredentialSwap,
            Self::CredentialCheck(_) => ErrorKind::CredentialCheck,
            Self::Credential(_) => ErrorKind::Credential,
            Self::Api { .. } => ErrorKind::Api,
            Self::Config(_) | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Validation report carried by a `Validation` error
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Validation(report) => Some(report),
            _ => None,
        }
    }

    /// Serializable summary of this error
    pub fn to_detail(&self) -> FailureDetail {
        FailureDetail {
            kind: self.kind(),
            class: self.class(),
            status: self.status(),
            message: self.to_string(),
            violations: self
                .validation_report()
                .map(|r| r.errors.clone())
                .unwrap_or_default(),
        }
    }
}

impl From<ValidationReport> for PublishError {
    fn from(report: ValidationReport) -> Self {
        Self::Validation(report)
    }
}

/// Flat error kind, mirroring the error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    NotFound,
    BadRequest,
    RetryableService,
    RetriesExhausted,
    InvalidState,
    CredentialSwap,
    CredentialCheck,
    Credential,
    Api,
    Internal,
}

/// Typed, serializable failure outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Taxonomy kind
    pub kind: ErrorKind,
    /// Remote classification (for `retries_exhausted`, the last underlying class)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
    /// HTTP status, if one was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Violated rules for validation failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<ValidationIssue>,
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}
