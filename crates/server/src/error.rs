// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pagefan_core::{DispatchError, TrackerError};
use serde::Serialize;
use thiserror::Error;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

fn tracker_response(err: &TrackerError) -> (StatusCode, ErrorResponse) {
    if err.is_retryable() {
        tracing::warn!(error = %err, "Job store unavailable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorResponse::with_details("Job store unavailable", err.to_string()),
        )
    } else {
        tracing::error!(error = %err, "Job store error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::with_details("Job store error", err.to_string()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Dispatch(DispatchError::TooManyPages { requested, max }) => {
                tracing::warn!(requested, max, "Job too large");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details(
                        "Job too large",
                        format!("Requested {requested} pages, the limit is {max}"),
                    ),
                )
            }
            ApiError::Dispatch(DispatchError::EmptyJob) => {
                tracing::warn!("Empty job requested");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("Job has no pages"),
                )
            }
            ApiError::Dispatch(DispatchError::Tracker(e)) | ApiError::Tracker(e) => {
                tracker_response(e)
            }
            ApiError::Dispatch(DispatchError::Channel(e)) => {
                tracing::error!(error = %e, "Work channel rejected job");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse::with_details("Work channel unavailable", e.to_string()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
