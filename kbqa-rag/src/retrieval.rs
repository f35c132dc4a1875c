//! Similarity retrieval against the vector index.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::ScoredChunk;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Embeds a question and fetches its nearest chunks.
#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Create a retriever over `store` using `embedder` for questions.
    pub fn new(embedder: Embedder, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Return the index handle.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return up to `top_k` chunks ordered by descending similarity.
    ///
    /// An empty index, or `top_k == 0`, yields an empty result without
    /// calling the embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the index cannot be searched
    /// or was built with a different embedding model, and
    /// [`RagError::ProviderError`] if the question cannot be embedded.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 || self.store.is_empty().await? {
            info!(top_k, "nothing to retrieve");
            return Ok(Vec::new());
        }

        if let Some(model) = self.store.embedding_model().await? {
            if model != self.embedder.model_name() {
                error!(
                    index_model = %model,
                    query_model = self.embedder.model_name(),
                    "embedding model mismatch"
                );
                return Err(RagError::index(
                    "retrieval",
                    format!(
                        "index was built with '{model}' but queries use '{}'",
                        self.embedder.model_name()
                    ),
                ));
            }
        }

        let query_embedding = self.embedder.embed_single(query).await?;
        let results = self.store.similarity_search(&query_embedding, top_k).await?;

        info!(top_k, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
