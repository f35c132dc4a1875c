//! Configuration for the knowledge pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Retry policy for remote embedding calls.
///
/// The delay before retry `n` (1-based) is `base_delay_ms * n`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay in milliseconds, multiplied by the attempt number.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts, base_delay_ms: 0 }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Configuration parameters for ingestion and querying.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved from the vector index per question.
    pub top_k: usize,
    /// Number of chunks kept after reranking. Zero disables reranking.
    pub rerank_top_n: usize,
    /// Maximum number of texts per embedding call.
    pub embed_batch_size: usize,
    /// Retry policy for embedding calls.
    pub retry: RetryPolicy,
    /// Number of embedding batches or batch questions processed at once.
    pub concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 20,
            rerank_top_n: 5,
            embed_batch_size: 25,
            retry: RetryPolicy::default(),
            concurrency: 1,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks kept after reranking.
    pub fn rerank_top_n(mut self, n: usize) -> Self {
        self.config.rerank_top_n = n;
        self
    }

    /// Set the maximum number of texts per embedding call.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the retry policy for embedding calls.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set how many embedding batches or batch questions run at once.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_batch_size == 0`
    /// - `retry.max_attempts == 0`
    /// - `concurrency == 0`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if config.embed_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size must be greater than zero".to_string(),
            ));
        }
        if config.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        if config.concurrency == 0 {
            return Err(RagError::ConfigError("concurrency must be greater than zero".to_string()));
        }
        Ok(config)
    }
}
