//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::db::services::NoteServiceError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Invalid request (validation error)
    BadRequest(String),
    /// Service layer failure
    Service(NoteServiceError),
    /// Repository failure from a handler that talks to the repository directly
    Repository(RepositoryError),
}

fn storage_response(err: &RepositoryError, message: String) -> (StatusCode, ApiError) {
    if err.is_retryable() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new("UNAVAILABLE", message),
        )
    } else {
        tracing::error!("repository failure: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("REPOSITORY_ERROR", message),
        )
    }
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Service(err) => {
                let message = err.to_string();
                match err {
                    NoteServiceError::Validation { .. } => {
                        (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", message))
                    }
                    NoteServiceError::NotFound { .. } => {
                        (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
                    }
                    NoteServiceError::Storage { source, .. } => {
                        let (status, body) = storage_response(&source, message);
                        (status, body.with_details(source.message()))
                    }
                }
            }
            AppError::Repository(err) => {
                let message = err.to_string();
                if err.is_not_found() {
                    (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
                } else if matches!(err, RepositoryError::ValidationError { .. }) {
                    (
                        StatusCode::BAD_REQUEST,
                        ApiError::new("BAD_REQUEST", err.message()),
                    )
                } else {
                    storage_response(&err, message)
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        (status, Json(error)).into_response()
    }
}

impl From<NoteServiceError> for AppError {
    fn from(err: NoteServiceError) -> Self {
        AppError::Service(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}
