//! Shared collaborator error type

use thiserror::Error;

/// Failures of geocoding, routing and geolocation calls
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("Request timed out")]
    Timeout,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Service returned HTTP status {0}")]
    Status(u16),

    #[error("No route found: {0}")]
    NoRoute(String),

    #[error("Service returned no results")]
    EmptyResult,

    #[error("Malformed service response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ServiceError::Status(status.as_u16())
        } else {
            ServiceError::Http(e.to_string())
        }
    }
}
