//! Ingestion pipeline: documents → chunks → embeddings → index.
//!
//! Ingestion is a full rebuild. Every run replaces the previous index
//! contents, and any embedding batch that exhausts its retries aborts the run
//! before the index is touched.
//!
//! # Example
//!
//! ```rust,ignore
//! use kbqa_rag::{IngestionPipeline, InMemoryVectorStore, JsonDirectoryLoader, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(provider)
//!     .vector_store(Arc::new(InMemoryVectorStore::persistent("index.json")))
//!     .build()?;
//!
//! let documents = JsonDirectoryLoader::new("data/processed").load().await?;
//! let index = pipeline.ingest(documents).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::provider::EmbeddingProvider;
use crate::vectorstore::VectorStore;

/// Builds the vector index from loaded documents.
pub struct IngestionPipeline {
    chunker: Arc<dyn Chunker>,
    embedder: Embedder,
    vector_store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return the index handle this pipeline writes to.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Chunk, embed and index `documents`, replacing the previous index.
    ///
    /// Documents without content are discarded first. Chunks whose embedding
    /// batch came back empty are left out of the index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`] if no document has content, and
    /// [`RagError::IngestionError`] wrapping the first embedding or index
    /// failure.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<Arc<dyn VectorStore>> {
        let total = documents.len();
        let documents: Vec<Document> =
            documents.into_iter().filter(Document::has_content).collect();
        if documents.len() < total {
            info!(discarded = total - documents.len(), "discarded documents without content");
        }

        let chunks = self.chunker.split_documents(&documents);
        if chunks.is_empty() {
            warn!(documents = total, "no content to ingest");
            return Err(RagError::InputError("no documents with content to ingest".to_string()));
        }
        info!(documents = documents.len(), chunk_count = chunks.len(), "split documents");

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_aligned(&texts).await.map_err(|e| {
            error!(error = %e, "embedding failed, aborting ingestion");
            RagError::IngestionError(Box::new(e))
        })?;

        let (chunks, vectors): (Vec<_>, Vec<_>) = chunks
            .into_iter()
            .zip(embeddings)
            .filter_map(|(chunk, embedding)| embedding.map(|vector| (chunk, vector)))
            .unzip();
        let skipped = texts.len() - chunks.len();
        if skipped > 0 {
            warn!(skipped, "chunks left unindexed after empty embedding responses");
        }

        let chunk_count = chunks.len();
        self.vector_store.rebuild(self.embedder.model_name(), chunks, vectors).await.map_err(
            |e| {
                error!(error = %e, "index rebuild failed");
                RagError::IngestionError(Box::new(e))
            },
        )?;

        info!(chunk_count, skipped, "ingestion complete");
        Ok(Arc::clone(&self.vector_store))
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `embedding_provider` and `vector_store` are required. Without an explicit
/// chunker a [`RecursiveChunker`] sized from the config is used.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the index to rebuild.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set a custom chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        });

        Ok(IngestionPipeline { chunker, embedder: Embedder::new(provider, &config), vector_store })
    }
}
