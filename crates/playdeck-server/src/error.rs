//! Error types for the service endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use playdeck_core::{ErrorKind, PublishError};
use serde_json::json;
use thiserror::Error;

/// Failures while handling a request.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The request body is not a usable JSON object.
    #[error("{0}")]
    Malformed(String),

    /// A credential field could not be decoded.
    #[error("{0}")]
    Decode(String),

    /// The candidate credential cannot authenticate.
    #[error("Invalid credentials: {0}")]
    Rejected(String),

    /// A release, listing or reporting operation failed.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EndpointError {
    /// Returns the HTTP status code for this error.
    ///
    /// - Malformed body, undecodable field or invalid input: 400 Bad Request
    /// - Unusable candidate credential: 401 Unauthorized
    /// - Missing remote resource: 404 Not Found
    /// - Release in the wrong state: 409 Conflict
    /// - Google Play refused the call: 502 Bad Gateway
    /// - Google Play unavailable after retries: 503 Service Unavailable
    /// - Internal: 500 Internal Server Error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Publish(e) => match e.kind() {
                ErrorKind::Validation | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
                ErrorKind::CredentialSwap => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidState => StatusCode::CONFLICT,
                ErrorKind::Auth | ErrorKind::Api => StatusCode::BAD_GATEWAY,
                ErrorKind::RetryableService
                | ErrorKind::RetriesExhausted
                | ErrorKind::CredentialCheck => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Credential | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for EndpointError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Publish(e) => json!({
                "success": false,
                "error": self.to_string(),
                "detail": e.to_detail(),
            }),
            _ => json!({
                "success": false,
                "error": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
