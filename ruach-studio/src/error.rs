//! Error types for ruach-studio
//!
//! `StudioError` is the engine's failure taxonomy; `ApiError` maps it (and
//! transport-level failures) onto HTTP responses carrying a caller action.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// What the caller should do about a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    /// Transient; repeat the same request later
    RetryLater,
    /// The request or the session's state must change first
    FixInput,
    /// Something is broken; a human must intervene
    Escalate,
}

/// Engine-level failures
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not permitted in the current state (session status, approval, readiness)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Input rejected as invalid (unknown angle, broken program track, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Alignment or transcription failed; safe to retry
    #[error("Sync computation failed: {0}")]
    SyncComputationFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Rate limit exceeded for {operation}; retry after {}s", retry_after.as_secs())]
    RateLimited {
        operation: String,
        limit: u32,
        retry_after: Duration,
    },

    #[error(transparent)]
    Common(#[from] ruach_common::Error),
}

impl StudioError {
    pub fn action(&self) -> ErrorAction {
        match self {
            StudioError::NotFound(_)
            | StudioError::Precondition(_)
            | StudioError::Validation(_) => ErrorAction::FixInput,
            StudioError::SyncComputationFailed(_)
            | StudioError::TranscriptionFailed(_)
            | StudioError::RateLimited { .. } => ErrorAction::RetryLater,
            StudioError::Common(ruach_common::Error::NotFound(_))
            | StudioError::Common(ruach_common::Error::InvalidInput(_)) => ErrorAction::FixInput,
            StudioError::Common(err) if err.is_lock_contention() => ErrorAction::RetryLater,
            StudioError::Common(_) => ErrorAction::Escalate,
        }
    }
}

impl From<sqlx::Error> for StudioError {
    fn from(err: sqlx::Error) -> Self {
        StudioError::Common(ruach_common::Error::Database(err))
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::Common(ruach_common::Error::Serialization(err))
    }
}

/// Result type for engine operations
pub type StudioResult<T> = Result<T, StudioError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Studio(#[from] StudioError),

    /// ruach-common error
    #[error("Common error: {0}")]
    Common(#[from] ruach_common::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, ErrorAction) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", ErrorAction::FixInput),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", ErrorAction::FixInput),
            ApiError::Internal(_) | ApiError::Other(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                ErrorAction::Escalate,
            ),
            ApiError::Common(err) => common_parts(err),
            ApiError::Studio(err) => {
                let (status, code) = match err {
                    StudioError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    StudioError::Precondition(_) => (StatusCode::CONFLICT, "PRECONDITION_FAILED"),
                    StudioError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED"),
                    StudioError::SyncComputationFailed(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "SYNC_COMPUTATION_FAILED")
                    }
                    StudioError::TranscriptionFailed(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "TRANSCRIPTION_FAILED")
                    }
                    StudioError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
                    StudioError::Common(common) => {
                        let (status, code, _) = common_parts(common);
                        (status, code)
                    }
                };
                (status, code, err.action())
            }
        }
    }
}

fn common_parts(err: &ruach_common::Error) -> (StatusCode, &'static str, ErrorAction) {
    match err {
        ruach_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", ErrorAction::FixInput),
        ruach_common::Error::InvalidInput(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_FAILED",
            ErrorAction::FixInput,
        ),
        err if err.is_lock_contention() => (
            StatusCode::SERVICE_UNAVAILABLE,
            "DATABASE_BUSY",
            ErrorAction::RetryLater,
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "COMMON_ERROR",
            ErrorAction::Escalate,
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, action) = self.parts();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "action": action,
            }
        }));

        let mut response = (status, body).into_response();

        if let ApiError::Studio(StudioError::RateLimited { retry_after, limit, .. }) = &self {
            let headers = response.headers_mut();
            // Whole seconds, rounded up
            let secs = retry_after.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert(header::RETRY_AFTER, value);
            }
            if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
                headers.insert("x-ratelimit-limit", value);
            }
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
