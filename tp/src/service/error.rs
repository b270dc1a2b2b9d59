//! Planning service error types

use thiserror::Error;

/// Errors that can occur while talking to the planning service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Whether the service answered but refused the request
    pub fn is_rejection(&self) -> bool {
        match self {
            ServiceError::Api { status, .. } => (400..500).contains(status),
            ServiceError::Rejected(_) | ServiceError::NotFound(_) => true,
            ServiceError::Network(_) | ServiceError::InvalidResponse(_) | ServiceError::Json(_) => false,
        }
    }

    /// HTTP status, when the service produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Api { status, .. } => Some(*status),
            ServiceError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}
