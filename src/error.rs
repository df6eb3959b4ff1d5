//! Error types for the gateway and their HTTP mappings.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;

/// Failure talking to Shimmy.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, reset before a response.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend timed out: {0}")]
    Timeout(String),

    /// Shimmy answered with a non-2xx status.
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: Value },

    /// Response body was not the JSON we expected.
    #[error("invalid backend response: {0}")]
    InvalidBody(String),

    #[error("backend request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(err.to_string())
        } else if err.is_connect() {
            BackendError::Unreachable(err.to_string())
        } else if err.is_decode() {
            BackendError::InvalidBody(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by route handlers before a response has started.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Shimmy answered non-2xx on a passthrough route: status and body go back as-is.
    #[error("upstream returned {status}")]
    Upstream { status: StatusCode, body: Value },

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    /// Map a backend failure on an action route: non-2xx is propagated,
    /// everything else becomes a 500.
    pub fn passthrough(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, body } => ProxyError::Upstream { status, body },
            other => ProxyError::Internal(other.to_string()),
        }
    }
}

impl From<BackendError> for ProxyError {
    fn from(err: BackendError) -> Self {
        ProxyError::Internal(err.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ProxyError::Upstream { status, body } => return (status, Json(body)).into_response(),
            ProxyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ProxyError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ProxyError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ProxyError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
