//! Batched, retrying embedding client.
//!
//! [`Embedder`] sits between the pipeline and an [`EmbeddingProvider`]. It
//! partitions inputs into provider-sized batches, retries each batch on any
//! error according to a [`RetryPolicy`], and fails the whole call once a
//! batch exhausts its attempts. Batches that already succeeded are never
//! re-sent.

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{error, info, warn};

use crate::config::{RagConfig, RetryPolicy};
use crate::error::{RagError, Result};
use crate::provider::EmbeddingProvider;

/// In-flight state for one embedding batch.
struct BatchJob<'a> {
    batch_index: usize,
    texts: Vec<&'a str>,
    attempt_count: u32,
}

/// Embedding client applying batch limits and retries to a provider.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    retry: RetryPolicy,
    concurrency: usize,
}

impl Embedder {
    /// Create an embedder using the batch size, retry policy and concurrency
    /// from `config`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self {
            provider,
            batch_size: config.embed_batch_size.max(1),
            retry: config.retry,
            concurrency: config.concurrency.max(1),
        }
    }

    /// Override the maximum number of texts per provider call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Name of the underlying embedding model.
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed a single text, retrying on failure.
    ///
    /// # Errors
    ///
    /// Returns the last [`RagError::ProviderError`] once the retry budget is
    /// exhausted.
    pub async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.provider.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) if attempt < self.retry.max_attempts => {
                    let wait = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "embedding failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "embedding failed after all retries");
                    return Err(e);
                }
            }
        }
    }

    /// Embed all texts, returning the vectors of every non-empty batch
    /// response concatenated in input order.
    ///
    /// # Errors
    ///
    /// Fails on the first batch that exhausts its retry budget.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.embed_aligned(texts).await?.into_iter().flatten().collect())
    }

    /// Embed all texts, returning one slot per input.
    ///
    /// A slot is `None` when its batch came back empty; such a batch is
    /// accepted and logged rather than treated as an error.
    ///
    /// # Errors
    ///
    /// Fails on the first batch that exhausts its retry budget.
    pub async fn embed_aligned(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total_batches = texts.len().div_ceil(self.batch_size);
        let jobs = texts.chunks(self.batch_size).enumerate().map(|(batch_index, batch)| BatchJob {
            batch_index,
            texts: batch.iter().map(String::as_str).collect(),
            attempt_count: 0,
        });

        let outcomes: Vec<Vec<Option<Vec<f32>>>> = stream::iter(jobs)
            .map(|job| self.run_job(job, total_batches))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(outcomes.into_iter().flatten().collect())
    }

    async fn run_job(
        &self,
        mut job: BatchJob<'_>,
        total_batches: usize,
    ) -> Result<Vec<Option<Vec<f32>>>> {
        let batch_number = job.batch_index + 1;
        loop {
            job.attempt_count += 1;
            let result = self.provider.embed_batch(&job.texts).await.and_then(|vectors| {
                if vectors.is_empty() || vectors.len() == job.texts.len() {
                    Ok(vectors)
                } else {
                    let message = format!(
                        "returned {} embeddings for {} inputs",
                        vectors.len(),
                        job.texts.len()
                    );
                    Err(RagError::provider(self.provider.model_name(), message))
                }
            });

            match result {
                Ok(vectors) if vectors.is_empty() => {
                    warn!(batch = batch_number, total_batches, "embedding batch returned nothing");
                    return Ok(vec![None; job.texts.len()]);
                }
                Ok(vectors) => {
                    info!(batch = batch_number, total_batches, "embedded batch");
                    return Ok(vectors.into_iter().map(Some).collect());
                }
                Err(e) if job.attempt_count < self.retry.max_attempts => {
                    let wait = self.retry.delay_for(job.attempt_count);
                    warn!(
                        batch = batch_number,
                        attempt = job.attempt_count,
                        max_attempts = self.retry.max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "embedding batch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!(
                        batch = batch_number,
                        attempts = job.attempt_count,
                        error = %e,
                        "embedding batch failed after all retries"
                    );
                    return Err(e);
                }
            }
        }
    }
}
