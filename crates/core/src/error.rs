//! Error types for ragvault.
//!
//! One enum covers every error category in the workspace: configuration,
//! I/O, storage, embedding, ingestion and caller contract violations.

use thiserror::Error;

/// Unified error type for ragvault.
///
/// Storage backends only surface `InvalidInput` from their data operations;
/// transport and query failures are logged and absorbed at the backend
/// boundary. `Storage` covers backend construction and introspection.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable store initialization or introspection errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Document discovery and ingestion errors
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Caller contract violations (empty content, dimension mismatch)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_category() {
        let err = AppError::InvalidInput("embedding has 3 dimensions, expected 4".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid input: embedding has 3 dimensions, expected 4"
        );

        let err = AppError::Storage("connection refused".to_string());
        assert!(err.to_string().starts_with("Storage error"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
