//! Error handling module for the gallery cache.
//!
//! Provides the centralized error type with stable error codes and a serializable
//! envelope for presenting write failures next to the action that caused them.

use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const TRANSPORT_FAILURE: &str = "TRANSPORT_FAILURE";
    pub const STORAGE_CORRUPTION: &str = "STORAGE_CORRUPTION";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Failure reported by the transport collaborator (network, timeout or HTTP status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// HTTP status when the backend answered at all
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// Cache error type.
#[derive(Debug)]
pub enum CacheError {
    /// Backend unreachable or answered with an error status
    Transport(TransportError),
    /// Persisted JSON could not be parsed
    StorageCorruption { key: String, message: String },
    /// Durable store failure
    Storage(String),
    /// Compare-and-swap lost against a concurrent writer
    Conflict {
        key: String,
        expected_version: i64,
        current_version: i64,
    },
    /// Entity not found locally or remotely
    NotFound(String),
    /// Rejected draft or payload
    Validation(String),
    /// Payload could not be encoded or decoded
    Serialization(String),
    Internal(String),
}

impl CacheError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            CacheError::Transport(_) => codes::TRANSPORT_FAILURE,
            CacheError::StorageCorruption { .. } => codes::STORAGE_CORRUPTION,
            CacheError::Storage(_) => codes::STORAGE_ERROR,
            CacheError::Conflict { .. } => codes::CONFLICT,
            CacheError::NotFound(_) => codes::NOT_FOUND,
            CacheError::Validation(_) => codes::VALIDATION_ERROR,
            CacheError::Serialization(_) => codes::SERIALIZATION_ERROR,
            CacheError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            CacheError::Transport(err) => err.to_string(),
            CacheError::StorageCorruption { key, message } => {
                format!("Corrupted entry {}: {}", key, message)
            }
            CacheError::Storage(msg) => msg.clone(),
            CacheError::Conflict {
                key,
                expected_version,
                current_version,
            } => format!(
                "Version mismatch on {}: expected {}, current {}",
                key, expected_version, current_version
            ),
            CacheError::NotFound(msg) => msg.clone(),
            CacheError::Validation(msg) => msg.clone(),
            CacheError::Serialization(msg) => msg.clone(),
            CacheError::Internal(msg) => msg.clone(),
        }
    }

    /// True when the failure came from the backend rather than local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, CacheError::Transport(_))
    }
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for CacheError {}

impl From<TransportError> for CacheError {
    fn from(err: TransportError) -> Self {
        CacheError::Transport(err)
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        CacheError::Storage(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        CacheError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::with_status(status.as_u16(), err.to_string()),
            None => TransportError::new(err.to_string()),
        }
    }
}

/// Error details shown next to the action that failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl From<&CacheError> for ErrorDetails {
    fn from(error: &CacheError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.message(),
        }
    }
}
