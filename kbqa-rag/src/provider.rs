//! Capability traits for the remote model provider.
//!
//! A provider offers three logical operations: embedding, reranking and
//! text generation. Each is a separate trait so that pipeline stages only
//! depend on what they call, and so that tests can substitute any one of
//! them. [`ModelProvider`] bundles all three for adapters that implement the
//! full set.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// These methods make exactly one attempt against the remote service.
/// Batching limits and retries are applied by [`Embedder`](crate::Embedder).
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs in one call.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding. An empty `Ok` result is allowed and
    /// means the provider produced nothing for this batch.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Name of the embedding model. Indexes record it so that queries are
    /// never embedded with a different model than the one used at ingestion.
    fn model_name(&self) -> &str;
}

/// A provider that orders documents by relevance to a query.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    /// Return indices into `documents`, most relevant first, at most `top_n`
    /// of them.
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<usize>>;
}

/// A provider that completes a prompt with generated text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt` under the given system instruction.
    async fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

/// A provider implementing every capability the pipeline needs.
pub trait ModelProvider: EmbeddingProvider + RerankProvider + GenerationProvider {}

impl<T> ModelProvider for T where T: EmbeddingProvider + RerankProvider + GenerationProvider {}
