//! Exit codes for the CLI

#![allow(dead_code)]

use playdeck_core::{ErrorKind, PublishError};

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Authentication or credential error
pub const AUTH_ERROR: i32 = 3;

/// Remote service error after retries
pub const SERVICE_ERROR: i32 = 4;

/// Validation error
pub const VALIDATION_ERROR: i32 = 5;

/// Some tracks of a batch failed
pub const PARTIAL_FAILURE: i32 = 6;

/// Map a command failure to a process exit code
pub fn for_error(error: &anyhow::Error) -> i32 {
    let Some(publish) = error.downcast_ref::<PublishError>() else {
        return ERROR;
    };

    match publish.kind() {
        ErrorKind::Validation => VALIDATION_ERROR,
        ErrorKind::Auth | ErrorKind::Credential | ErrorKind::CredentialSwap => AUTH_ERROR,
        ErrorKind::RetryableService | ErrorKind::RetriesExhausted | ErrorKind::CredentialCheck => {
            SERVICE_ERROR
        }
        ErrorKind::Internal if matches!(publish, PublishError::Config(_)) => CONFIG_ERROR,
        _ => ERROR,
    }
}
