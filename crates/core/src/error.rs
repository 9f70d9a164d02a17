//! Error types for nearest.
//!
//! A single error enum covers request validation, index lookup, storage
//! backend failures, configuration and serialization.

use thiserror::Error;

/// Unified error type for nearest.
///
/// Query failures (`InvalidParameter`, `InvalidDimension`, `IndexUnavailable`)
/// are surfaced to the caller as-is and never retried.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request shape (zero limit, limit above the candidate budget, ...)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Query vector length does not match the indexed dimensionality
    #[error("Invalid dimension: index expects {expected} dimensions, query has {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// No vector index exists on the requested path
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Storage backend errors
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for the errors a query raises on a bad request, as opposed to
    /// backend or environment failures.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidParameter(_)
                | AppError::InvalidDimension { .. }
                | AppError::IndexUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
