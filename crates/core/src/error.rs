//! Error types for SmartFind.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! asset loading, index persistence and keyword-index errors. Outcomes that
//! are not failures (empty input, no recognized vocabulary, no index yet)
//! are represented as empty results by the engine and never appear here as
//! errors returned from read operations.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading the static embedding assets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// One of the mandatory asset files does not exist.
    #[error("missing asset: {}", path.display())]
    MissingAsset { path: PathBuf },

    /// Asset files exist but are malformed or have inconsistent shapes.
    #[error("corrupt asset: {0}")]
    Corrupt(String),
}

/// Unified error type for SmartFind.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding asset errors (classification and retrieval are degraded)
    #[error("Asset error: {0}")]
    Asset(#[from] LoadError),

    /// Failure while saving or loading the persisted index
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No persisted index exists yet
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Keyword index errors
    #[error("Lexical index error: {0}")]
    Lexical(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
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
    fn test_load_error_converts_to_asset() {
        let err: AppError = LoadError::MissingAsset {
            path: PathBuf::from("/assets/vocab.json"),
        }
        .into();

        assert!(matches!(err, AppError::Asset(LoadError::MissingAsset { .. })));
        assert!(err.to_string().contains("vocab.json"));
    }

    #[test]
    fn test_json_error_is_serialization() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: AppError = parse.unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
