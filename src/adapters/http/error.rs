//! Mapping of core errors to HTTP responses.
//!
//! Missing and forbidden resources share one 404 body so a caller cannot
//! probe for records they may not see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::foundation::{CoreError, ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Core(CoreError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(msg, "BAD_REQUEST"),
            ),
            ApiError::Core(err) => match err {
                CoreError::NotFound { .. } | CoreError::Forbidden => (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("access denied", "ACCESS_DENIED"),
                ),
                CoreError::Invalid { .. } => (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(err.to_string(), err.code().to_string()),
                ),
                CoreError::InvalidState(ref msg) => (
                    StatusCode::CONFLICT,
                    ErrorResponse::new(msg.clone(), err.code().to_string()),
                ),
                CoreError::Transient(ref msg) => {
                    tracing::warn!("Transient failure surfaced to caller: {}", msg);
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        ErrorResponse::new("Temporarily unavailable, try again", err.code().to_string()),
                    )
                }
                CoreError::Internal(ref msg) => {
                    tracing::error!("Internal error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("An internal error occurred", err.code().to_string()),
                    )
                }
            },
        };
        (status, Json(body)).into_response()
    }
}
