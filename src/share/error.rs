use crate::backend::BackendError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

/// Failures while resolving a share or one of its assets. Every variant
/// renders as the same empty 404 so callers cannot tell a bad key from a
/// missing asset.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Invalid share key")]
    InvalidKey,

    #[error("Invalid asset id")]
    InvalidId,

    #[error("Invalid size variant: {0}")]
    InvalidSize(String),

    #[error("Invalid share mode: {0}")]
    InvalidMode(String),

    #[error("Share not found")]
    ShareNotFound,

    #[error("Asset not found in share")]
    AssetNotFound,

    #[error("Download not available for this share")]
    DownloadUnavailable,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        match &self {
            ShareError::Backend(e) => warn!("Share resolution failed: {}", e),
            other => debug!("Share request rejected: {}", other),
        }
        StatusCode::NOT_FOUND.into_response()
    }
}

pub const LISTING_ERROR_MESSAGE: &str = "Invalid or expired share key";

/// Listing failure, reported as a fixed JSON envelope.
#[derive(Debug, Error)]
#[error("Invalid or expired share key")]
pub struct ListingError;

impl From<ShareError> for ListingError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::Backend(e) => warn!("Listing resolution failed: {}", e),
            other => debug!("Listing rejected: {}", other),
        }
        ListingError
    }
}

impl IntoResponse for ListingError {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": LISTING_ERROR_MESSAGE })),
        )
            .into_response()
    }
}
