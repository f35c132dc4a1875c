//! Error types for the `kbqa-rag` crate.

use thiserror::Error;

/// Errors that can occur in knowledge pipeline operations.
///
/// Only some of these ever reach a caller of the query path: rerank and
/// generation failures are absorbed into degraded answers, while ingestion
/// treats any provider failure as fatal.
#[derive(Debug, Error)]
pub enum RagError {
    /// A remote model call failed or returned a non-success status.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        /// The provider (or provider operation) that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Model output did not match the expected structured shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The vector index could not be read or written.
    #[error("Index unavailable ({backend}): {message}")]
    IndexUnavailable {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Caller input was missing or malformed (empty query, bad batch file).
    #[error("Input error: {0}")]
    InputError(String),

    /// An ingestion run aborted on an unrecoverable error.
    #[error("Ingestion failed: {0}")]
    IngestionError(#[source] Box<RagError>),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub(crate) fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::ProviderError { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn index(backend: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::IndexUnavailable { backend: backend.into(), message: message.into() }
    }
}

/// A convenience result type for knowledge pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
