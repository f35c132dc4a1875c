//! Vector store trait for persisting and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;

/// A storage backend for chunk embeddings with similarity search.
///
/// Writes are full rebuilds: [`rebuild`](VectorStore::rebuild) replaces the
/// previous contents entirely. Rebuilding is not safe to run concurrently with
/// another rebuild; searches may run concurrently with each other.
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.rebuild("text-embedding-v2", chunks, vectors).await?;
/// let results = store.similarity_search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Replace the store contents with `chunks`, paired 1:1 with `vectors`.
    ///
    /// `model` names the embedding model that produced the vectors.
    async fn rebuild(&self, model: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()>;

    /// Return up to `top_k` chunks ordered by descending similarity to
    /// `embedding`. An empty store yields an empty result.
    async fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of chunks currently stored.
    async fn len(&self) -> Result<usize>;

    /// Whether the store holds no chunks.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Embedding model recorded by the last rebuild, if any.
    async fn embedding_model(&self) -> Result<Option<String>>;
}
