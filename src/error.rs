/// Unified error types for the Drops server
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum DropsError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic validation errors (bad parameters, missing operation data,
    /// unrecognized operations)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Envelope hash does not match the timestamped hash
    #[error("Timestamp hash and message content do not match")]
    HashMismatch,

    /// Outer envelope signature does not recover to the claimed sender
    #[error("Envelope signature does not match sender")]
    InvalidSignature,

    /// Timestamp signature does not recover to the authority address
    #[error("Timestamp not signed by the trusted authority")]
    UntrustedTimestamp,

    /// Sender has no index pointer published by this service
    #[error("User not registered with this service")]
    NotEnrolled,

    /// Content store or pointer store failures during append
    #[error("Storage error: {0}")]
    Storage(String),

    /// Relational mutation failed after the append already succeeded;
    /// the client must not retry by resubmitting
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body, `{"success": false, "error": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Convert DropsError to HTTP response
impl IntoResponse for DropsError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DropsError::Validation(_)
            | DropsError::HashMismatch
            | DropsError::InvalidSignature
            | DropsError::UntrustedTimestamp
            | DropsError::NotEnrolled => (StatusCode::BAD_REQUEST, self.to_string()),
            DropsError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            DropsError::Storage(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            DropsError::Database(_) | DropsError::Io(_) | DropsError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(), // Don't leak details
            ),
            DropsError::Consistency(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(ErrorBody {
            success: false,
            error: message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for Drops operations
pub type DropsResult<T> = Result<T, DropsError>;
