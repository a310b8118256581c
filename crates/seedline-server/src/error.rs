//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use seedline_core::ServiceError;
use serde_json::json;

/// Errors returned by the migration endpoints as `{error, message}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No or unknown bearer token (401).
    #[error("{0}")]
    Unauthorized(String),

    /// Caller lacks the required group (403).
    #[error("{0}")]
    Forbidden(String),

    /// Another run holds the lock (423).
    #[error("Another migration run in progress")]
    Locked { takeover_requested: bool },

    /// The run could not complete because the store failed (500).
    #[error("{0}")]
    MigrationFailed(String),

    /// Reading the state snapshot failed (500).
    #[error("{0}")]
    ScanFailed(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Locked { .. } => StatusCode::LOCKED,
            Self::MigrationFailed(_) | Self::ScanFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::Locked { .. } => "Locked",
            Self::MigrationFailed(_) => "MigrationFailed",
            Self::ScanFailed(_) => "ScanFailed",
        }
    }

    pub fn run_failed(err: ServiceError) -> Self {
        Self::MigrationFailed(err.to_string())
    }

    pub fn scan_failed(err: ServiceError) -> Self {
        Self::ScanFailed(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let Self::Locked { takeover_requested } = &self {
            body["takeoverRequested"] = json!(takeover_requested);
        }
        (self.status(), Json(body)).into_response()
    }
}
