//! Error types for FireGPT.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! model loading and invocation, retrieval, geodata, prompt and ingestion
//! failures.

use thiserror::Error;

/// Unified error type for FireGPT.
///
/// All fallible functions return `Result<T, AppError>`. Nothing in the
/// request path panics; every failure is represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Client input was missing or malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request payload exceeds the configured size cap
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A model artifact could not be turned into a backend
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// Runtime failure while generating with the active backend
    #[error("LLM error: {0}")]
    Llm(String),

    /// Chunk store and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Geocoding or nearby-resource lookup failures
    #[error("Geodata error: {0}")]
    Geo(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Document ingestion produced nothing usable
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_) | AppError::PayloadTooLarge(_)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AppError::InvalidInput("no query".to_string()).is_client_error());
        assert!(!AppError::Llm("timeout".to_string()).is_client_error());
        assert!(!AppError::ModelLoad("bad magic".to_string()).is_client_error());
    }

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Geo("overpass timed out".to_string());
        assert_eq!(err.to_string(), "Geodata error: overpass timed out");
    }
}
