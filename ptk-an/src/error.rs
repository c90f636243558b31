//! Error types for ptk-an
//!
//! Two layers: [`AnalysisError`] for per-image pipeline failures (caught
//! at the image boundary by the batch orchestrator) and [`ApiError`] for
//! the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Per-image analysis failure
///
/// Any of these aborts the current image only; the batch records the
/// message and moves on. Calibration absence is not an error (the
/// pipeline degrades to pixel-only metrics).
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Image file could not be opened or decoded
    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    /// No QR code payload could be decoded from the frame
    #[error("No QR code found")]
    NoQrCode,

    /// More than one distinct QR payload in the frame (reject, don't guess)
    #[error("Ambiguous QR codes: {0}")]
    AmbiguousQrCode(String),

    /// Segmentation produced an empty (or below-minimum) plant mask
    #[error("No plant detected (masked area {area_px} px)")]
    NoPlantDetected { area_px: u64 },

    /// Per-image processing exceeded the configured timeout
    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    /// Database read or write failed for this image
    #[error("Persistence failure: {0}")]
    Persistence(#[from] ptk_common::Error),

    /// I/O error reading the source file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for AnalysisError {
    fn from(err: sqlx::Error) -> Self {
        AnalysisError::Persistence(ptk_common::Error::Database(err))
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// ptk-common error
    #[error("Common error: {0}")]
    Common(#[from] ptk_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(ptk_common::Error::Database(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
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
