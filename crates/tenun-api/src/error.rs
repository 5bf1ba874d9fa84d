use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// External subsystem a request depended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Chat,
    Tts,
    Translation,
    Ocr,
    Classification,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chat => "Chat",
            Self::Tts => "TTS",
            Self::Translation => "Translation",
            Self::Ocr => "OCR",
            Self::Classification => "Classification",
        })
    }
}

/// Failure of an outbound call to a text-generation, speech, OCR or model service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The collaborator is not installed or not reachable at all.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// API error type. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    UnprocessableContent(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// A request that failed extraction, with the status axum assigned.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("{subsystem} error: {source}")]
    Upstream {
        subsystem: Subsystem,
        #[source]
        source: UpstreamError,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{} not found", what))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Wraps an outbound failure. A collaborator that is missing altogether
    /// is reported as unavailable rather than as a failed call.
    pub fn upstream(subsystem: Subsystem, source: UpstreamError) -> Self {
        match source {
            UpstreamError::Unavailable(reason) => {
                error!("{} service unavailable: {}", subsystem, reason);
                Self::ServiceUnavailable(format!("{} service is unavailable", subsystem))
            }
            source => Self::Upstream { subsystem, source },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnprocessableContent(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Rejected { status, detail } => (status, detail),
            ApiError::Upstream { subsystem, source } => {
                error!("{} upstream failure: {}", subsystem, source);
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{} error: the upstream service failed", subsystem),
                )
            }
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
