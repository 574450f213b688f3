//! Error types for geotunes-vibe
//!
//! `VibeError` is the pipeline taxonomy; `ApiError` maps it (and everything
//! else a handler can hit) onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Pipeline error taxonomy
///
/// An empty result set is not an error and never appears here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VibeError {
    /// No classifier model is loaded (or the artifact failed to load)
    #[error("Classifier model unavailable: {0}")]
    ModelUnavailable(String),

    /// Coordinate out of range or not numeric
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Planner limit was zero or negative
    #[error("Invalid limit: {0} (must be at least 1)")]
    InvalidLimit(i64),

    /// Requested source family has no credentials or client configured
    #[error("Source '{0}' is not configured")]
    SourceNotConfigured(String),

    /// Transport or auth failure talking to an external source
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
}

impl VibeError {
    /// Shorthand for a `SourceUnavailable` error
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        VibeError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for pipeline operations
pub type VibeResult<T> = Result<T, VibeError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Required collaborator not configured or not loaded (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream source failed outside the aggregator (502)
    #[error("Upstream error: {0}")]
    BadGateway(String),
}

impl From<VibeError> for ApiError {
    fn from(err: VibeError) -> Self {
        match err {
            VibeError::InvalidInput(_) | VibeError::InvalidLimit(_) => {
                ApiError::BadRequest(err.to_string())
            }
            VibeError::ModelUnavailable(_) | VibeError::SourceNotConfigured(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            VibeError::SourceUnavailable { .. } => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
        };

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vibe_error_status_mapping() {
        let cases = [
            (VibeError::InvalidInput("lat".into()), StatusCode::BAD_REQUEST),
            (VibeError::InvalidLimit(0), StatusCode::BAD_REQUEST),
            (
                VibeError::ModelUnavailable("not loaded".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                VibeError::SourceNotConfigured("content".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                VibeError::source_unavailable("spotify", "401"),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = VibeError::source_unavailable("drive", "timed out");
        assert_eq!(err.to_string(), "Source 'drive' unavailable: timed out");
    }
}
