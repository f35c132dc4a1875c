//! Relevance reranking of retrieved chunks.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::document::ScoredChunk;
use crate::provider::RerankProvider;

/// Reorders retrieved chunks with a remote rerank model.
///
/// Reranking is an optimization: every failure degrades to the first `top_n`
/// chunks in their original order, and is logged rather than returned.
/// Chunks are identified by their position in the input, so duplicate
/// contents are never confused with one another.
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::RerankStage;
///
/// let stage = RerankStage::new(provider);
/// let reranked = stage.rerank("query", retrieved, 5).await;
/// assert!(reranked.len() <= 5);
/// ```
#[derive(Clone)]
pub struct RerankStage {
    provider: Arc<dyn RerankProvider>,
}

impl RerankStage {
    /// Create a stage backed by `provider`.
    pub fn new(provider: Arc<dyn RerankProvider>) -> Self {
        Self { provider }
    }

    /// Rerank `chunks` against `query`, keeping at most `top_n`.
    ///
    /// With `top_n == 0` the input is returned unchanged and the provider is
    /// not called.
    pub async fn rerank(
        &self,
        query: &str,
        chunks: Vec<ScoredChunk>,
        top_n: usize,
    ) -> Vec<ScoredChunk> {
        if top_n == 0 {
            info!("rerank skipped");
            return chunks;
        }
        if chunks.is_empty() {
            return chunks;
        }

        let documents: Vec<&str> = chunks.iter().map(|c| c.chunk.content.as_str()).collect();
        let indices = match self.provider.rerank(query, &documents, top_n).await {
            Ok(indices) => indices,
            Err(e) => {
                warn!(error = %e, "rerank failed, keeping retrieval order");
                return first_n(chunks, top_n);
            }
        };

        let mut seen = HashSet::new();
        let order: Vec<usize> = indices
            .into_iter()
            .filter(|&i| i < chunks.len() && seen.insert(i))
            .take(top_n)
            .collect();
        if order.is_empty() {
            warn!("rerank output matched no retrieved chunk, keeping retrieval order");
            return first_n(chunks, top_n);
        }

        let mut slots: Vec<Option<ScoredChunk>> = chunks.into_iter().map(Some).collect();
        let reranked: Vec<ScoredChunk> =
            order.into_iter().filter_map(|i| slots[i].take()).collect();
        info!(kept = reranked.len(), top_n, "reranked chunks");
        reranked
    }
}

fn first_n(mut chunks: Vec<ScoredChunk>, n: usize) -> Vec<ScoredChunk> {
    chunks.truncate(n);
    chunks
}
