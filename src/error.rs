//! Unified error types for the Mosaic server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum MosaicError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ingestion rejected an uploaded payload
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Referenced entity does not exist or does not belong to the caller
    #[error("Not found: {0}")]
    NotFound(String),

    /// Capacity reached and no inactive image available to evict
    #[error("Image pool is full and no inactive image can be evicted")]
    PoolExhausted,

    /// Deletion of the sole active image refused
    #[error("Cannot delete the only active profile image; set another image as active first")]
    LastActiveImage,

    /// Object store failure
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict errors (e.g., duplicate username)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Email delivery errors
    #[error("Email error: {0}")]
    Email(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert MosaicError to HTTP response
impl IntoResponse for MosaicError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            MosaicError::InvalidImage(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidImage",
                self.to_string(),
            ),
            MosaicError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            MosaicError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            MosaicError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "Forbidden",
                self.to_string(),
            ),
            MosaicError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "NotFound",
                self.to_string(),
            ),
            MosaicError::PoolExhausted => (
                StatusCode::CONFLICT,
                "PoolExhausted",
                self.to_string(),
            ),
            MosaicError::LastActiveImage => (
                StatusCode::CONFLICT,
                "LastActiveImageProtected",
                self.to_string(),
            ),
            MosaicError::Conflict(_) => (
                StatusCode::CONFLICT,
                "Conflict",
                self.to_string(),
            ),
            MosaicError::Storage(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "StorageUnavailable",
                "Object storage is unavailable".to_string(), // Don't leak details
            ),
            MosaicError::Database(_)
            | MosaicError::Internal(_)
            | MosaicError::Io(_)
            | MosaicError::Email(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for server operations
pub type MosaicResult<T> = Result<T, MosaicError>;
