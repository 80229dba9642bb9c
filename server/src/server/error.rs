use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::marker::{ImportError, MarkerError};
use crate::services::ServiceError;
use crate::session::SessionError;

/// Error body for every API route
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub code: String,
}

impl ApiErrorResponse {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
        }
    }
}

impl From<MarkerError> for ApiErrorResponse {
    fn from(e: MarkerError) -> Self {
        let code = match &e {
            MarkerError::Validation(_) => "validation",
            MarkerError::NotFound(_) => "not_found",
        };
        Self::new(code, e.to_string())
    }
}

impl From<SessionError> for ApiErrorResponse {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Marker(e) => e.into(),
            SessionError::NoDialog => Self::new("no_dialog", e.to_string()),
            SessionError::NotEditing => Self::new("not_editing", e.to_string()),
        }
    }
}

impl From<ImportError> for ApiErrorResponse {
    fn from(e: ImportError) -> Self {
        Self::new("invalid_import", e.to_string())
    }
}

impl From<ServiceError> for ApiErrorResponse {
    fn from(e: ServiceError) -> Self {
        let code = match &e {
            ServiceError::Timeout => "timeout",
            ServiceError::PermissionDenied => "permission_denied",
            _ => "upstream",
        };
        Self::new(code, e.to_string())
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "validation" | "incomplete_selection" | "invalid_import" | "no_measurement" => {
                StatusCode::BAD_REQUEST
            }
            "no_dialog" | "not_editing" => StatusCode::CONFLICT,
            "permission_denied" => StatusCode::FORBIDDEN,
            "timeout" => StatusCode::GATEWAY_TIMEOUT,
            "upstream" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}
