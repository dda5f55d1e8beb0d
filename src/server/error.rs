//! HTTP error responses

use crate::error::BgReplaceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced by the HTTP handlers, each with a fixed JSON body
#[derive(Debug)]
pub enum ApiError {
    /// 400 `{ error: "No file uploaded" }`
    MissingFile,
    /// 400 `{ error: "Invalid upload", details }`
    InvalidUpload(String),
    /// 413 `{ error: "File too large", details }`
    TooLarge(String),
    /// 503 `{ error: "Server busy", details }`
    Busy(String),
    /// 500 `{ error: "Image processing failed", details }`
    Processing(String),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BgReplaceError> for ApiError {
    fn from(error: BgReplaceError) -> Self {
        match error {
            BgReplaceError::MissingUpload => Self::MissingFile,
            BgReplaceError::UploadTooLarge { .. } => Self::TooLarge(error.to_string()),
            BgReplaceError::InvalidUpload(message) => Self::InvalidUpload(message),
            BgReplaceError::Busy(message) => Self::Busy(message),
            other => Self::Processing(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Processing(details) => tracing::error!(details = %details, "Image processing failed"),
            Self::Busy(details) => tracing::warn!(details = %details, "Rejecting upload, no worker slot"),
            Self::MissingFile | Self::InvalidUpload(_) | Self::TooLarge(_) => {
                tracing::debug!(error = ?self, "Client error");
            },
        }

        let status = self.status_code();
        let body = match self {
            Self::MissingFile => json!({ "error": "No file uploaded" }),
            Self::InvalidUpload(details) => json!({ "error": "Invalid upload", "details": details }),
            Self::TooLarge(details) => json!({ "error": "File too large", "details": details }),
            Self::Busy(details) => json!({ "error": "Server busy", "details": details }),
            Self::Processing(details) => {
                json!({ "error": "Image processing failed", "details": details })
            },
        };

        (status, Json(body)).into_response()
    }
}
