//! API errors returned by the HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::protocol::models::ErrorBody;
use crate::PunchError;

/// Error type for handler responses, rendered as `{"error": ...}`.
#[derive(Debug, PartialEq, Eq)]
pub enum ApiError {
    /// No usable key in the request (400).
    KeyMissing,
    /// Key not recognized by any check (403).
    KeyInvalid,
    /// Grant store unreachable (503).
    StoreUnavailable,
    /// Anything else (500).
    Internal,
}

impl ApiError {
    /// Status code and wire message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::KeyMissing => (StatusCode::BAD_REQUEST, "key missing"),
            ApiError::KeyInvalid => (StatusCode::FORBIDDEN, "key invalid"),
            ApiError::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "store unavailable"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        }
    }
}

impl From<PunchError> for ApiError {
    fn from(e: PunchError) -> Self {
        match e {
            PunchError::KeyMissing => ApiError::KeyMissing,
            PunchError::KeyInvalid => ApiError::KeyInvalid,
            PunchError::StoreUnavailable(_) => ApiError::StoreUnavailable,
            other => {
                error!(error = %other, "Unexpected error while handling punch");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        let body = ErrorBody {
            error: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
