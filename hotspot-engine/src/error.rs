//! Error types for hotspot-engine
//!
//! Every handler error renders as `{"error": {"code", "message"}}`.

use crate::services::JobStoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409), e.g. results requested before the job completed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// hotspot-common error
    #[error("Common error: {0}")]
    Common(#[from] hotspot_common::Error),
}

impl From<JobStoreError> for ApiError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            JobStoreError::AlreadyFinished(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string()),
            // Map the common categories onto their HTTP meaning
            ApiError::Common(hotspot_common::Error::NotFound(msg)) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(hotspot_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
