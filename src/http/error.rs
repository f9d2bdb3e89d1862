//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::upstream::SourceError;

/// API error response body. Non-2xx responses always carry this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message
    pub detail: String,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// The game exists but has too little history to predict; recoverable
    /// after a sync.
    InsufficientHistory { records: usize, required: usize },
    /// The upstream price source failed or is not configured
    Upstream(String),
    /// Internal server error
    Internal(String),
    /// Repository error
    Repository(RepositoryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new(msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new(msg)),
            AppError::InsufficientHistory { records, required } => (
                StatusCode::CONFLICT,
                ApiError::new(format!(
                    "Insufficient history ({records} records, minimum {required}). Sync the game and retry."
                )),
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, ApiError::new(msg)),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new(msg)),
            AppError::Repository(e) => {
                if e.is_not_found() {
                    (StatusCode::NOT_FOUND, ApiError::new(e.to_string()))
                } else if matches!(e, RepositoryError::ValidationError { .. }) {
                    (StatusCode::BAD_REQUEST, ApiError::new(e.to_string()))
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, ApiError::new(e.to_string()))
                }
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
