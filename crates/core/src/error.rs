//! Error types for the Libris book-QA service.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: input validation, corpus/index integrity, embedding
//! and generation collaborators, and configuration.

use thiserror::Error;

/// Unified error type for the Libris service.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chunker received empty or whitespace-only source text
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Chapter boundary offsets fall outside the source text
    #[error("Invalid chapter boundary: {0}")]
    InvalidBoundary(String),

    /// Question rejected before retrieval (empty after trimming, etc.)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Caller-supplied access pre-condition was false
    #[error("Access denied: caller is not entitled to query")]
    AccessDenied,

    /// Index queried before it was built or loaded
    #[error("Embedding index is not loaded")]
    IndexNotLoaded,

    /// Query vector length differs from the index dimensionality
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Every retrieval candidate fell below the relevance floor.
    /// A signal, not necessarily fatal — the façade decides.
    #[error("No chunks cleared the relevance floor")]
    NoResults,

    /// Embedding collaborator errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generation collaborator unreachable or returned an error
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Generation collaborator timed out
    #[error("Generation timed out: {0}")]
    GenerationTimeout(String),

    /// Corpus store integrity errors (malformed or inconsistent stores)
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the façade may retry the failed operation.
    ///
    /// Only transient collaborator failures are retryable; input errors and
    /// index errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::GenerationUnavailable(_)
                | AppError::GenerationTimeout(_)
                | AppError::Embedding(_)
        )
    }

    /// Whether the error is the caller's fault (4xx-equivalent).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidQuery(_)
                | AppError::AccessDenied
                | AppError::EmptyInput(_)
                | AppError::InvalidBoundary(_)
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
    fn test_retryable_classification() {
        assert!(AppError::GenerationUnavailable("down".into()).is_retryable());
        assert!(AppError::GenerationTimeout("30s".into()).is_retryable());
        assert!(AppError::Embedding("transient".into()).is_retryable());

        assert!(!AppError::InvalidQuery("empty".into()).is_retryable());
        assert!(!AppError::IndexNotLoaded.is_retryable());
        assert!(!AppError::DimensionMismatch {
            expected: 384,
            actual: 768
        }
        .is_retryable());
    }

    #[test]
    fn test_input_error_classification() {
        assert!(AppError::InvalidQuery("empty".into()).is_input_error());
        assert!(AppError::AccessDenied.is_input_error());
        assert!(!AppError::GenerationUnavailable("down".into()).is_input_error());
        assert!(!AppError::NoResults.is_input_error());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 384, got 768");
    }
}
