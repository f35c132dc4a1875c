//! Query orchestrator: retrieve → rerank → generate.
//!
//! [`QaService`] answers one question with [`ask`](QaService::ask), or an
//! ordered list of questions with [`ask_batch`](QaService::ask_batch). Apart
//! from an empty question, every failure on this path degrades into a
//! well-formed [`StructuredAnswer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use kbqa_rag::{InMemoryVectorStore, QaService, RagConfig};
//!
//! let store = Arc::new(InMemoryVectorStore::open("index.json").await?);
//! let service = QaService::builder()
//!     .config(RagConfig::default())
//!     .provider(Arc::new(provider))
//!     .vector_store(store)
//!     .build()?;
//!
//! let answer = service.ask("What was Q1 revenue?", 20, 5).await?;
//! println!("{}", answer.final_answer);
//! ```

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::{info, warn};

use crate::answer::{QuestionRecord, StructuredAnswer};
use crate::config::RagConfig;
use crate::document::ScoredChunk;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::generation::GenerationStage;
use crate::prompt::{KeywordPromptSelector, PromptSelector};
use crate::provider::{EmbeddingProvider, GenerationProvider, ModelProvider, RerankProvider};
use crate::rerank::RerankStage;
use crate::retrieval::Retriever;
use crate::vectorstore::VectorStore;

/// Answers questions over an index built by the ingestion pipeline.
pub struct QaService {
    config: RagConfig,
    retriever: Retriever,
    reranker: RerankStage,
    generator: GenerationStage,
    prompts: Arc<dyn PromptSelector>,
}

impl QaService {
    /// Create a new [`QaServiceBuilder`].
    pub fn builder() -> QaServiceBuilder {
        QaServiceBuilder::default()
    }

    /// Return the service configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return the index handle.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        self.retriever.store()
    }

    /// Retrieve `top_k` chunks and rerank them down to `rerank_top_n`.
    ///
    /// # Errors
    ///
    /// Propagates retrieval errors; reranking never fails.
    pub async fn search_documents(
        &self,
        query: &str,
        top_k: usize,
        rerank_top_n: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let retrieved = self.retriever.retrieve(query, top_k).await?;
        if retrieved.is_empty() {
            return Ok(retrieved);
        }
        Ok(self.reranker.rerank(query, retrieved, rerank_top_n).await)
    }

    /// Answer `query` from the `top_k` nearest chunks, reranked down to
    /// `rerank_top_n` (0 skips reranking).
    ///
    /// When retrieval yields nothing, or the index cannot be searched, the
    /// fixed [`StructuredAnswer::no_results`] answer is returned without
    /// calling the generation model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`] if `query` is blank.
    pub async fn ask(
        &self,
        query: &str,
        top_k: usize,
        rerank_top_n: usize,
    ) -> Result<StructuredAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InputError("query must not be empty".to_string()));
        }
        info!(query, top_k, rerank_top_n, "received question");

        let chunks = match self.search_documents(query, top_k, rerank_top_n).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(error = %e, "retrieval failed, answering with no results");
                return Ok(StructuredAnswer::no_results());
            }
        };
        if chunks.is_empty() {
            info!("no relevant chunks found");
            return Ok(StructuredAnswer::no_results());
        }

        let prompt = self.prompts.select(query);
        Ok(self.generator.generate(query, &prompt, &chunks).await)
    }

    /// [`ask`](QaService::ask) with `top_k` and `rerank_top_n` from the config.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`] if `query` is blank.
    pub async fn ask_default(&self, query: &str) -> Result<StructuredAnswer> {
        self.ask(query, self.config.top_k, self.config.rerank_top_n).await
    }

    /// Answer every question in order, returning one answer per usable
    /// record.
    ///
    /// Records without question text are skipped with a warning. Up to
    /// `config.concurrency` questions are in flight at once; answers keep the
    /// order of their questions regardless of completion order.
    pub async fn ask_batch(&self, questions: &[QuestionRecord]) -> Vec<StructuredAnswer> {
        let total = questions.len();
        info!(total, "starting batch");

        let answers: Vec<Option<StructuredAnswer>> = stream::iter(questions.iter().enumerate())
            .map(|(i, record)| async move {
                let Some(text) = record.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                    warn!(question = i + 1, total, "skipping record without question text");
                    return None;
                };
                info!(question = i + 1, total, "processing question");
                match self.ask_default(text).await {
                    Ok(answer) => Some(answer),
                    Err(e) => {
                        warn!(question = i + 1, error = %e, "skipping question");
                        None
                    }
                }
            })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let answers: Vec<StructuredAnswer> = answers.into_iter().flatten().collect();
        info!(total, answered = answers.len(), "batch complete");
        answers
    }
}

/// Builder for constructing a [`QaService`].
///
/// The embedding, rerank and generation providers and the vector store are
/// required; [`provider`](QaServiceBuilder::provider) sets all three
/// providers at once.
#[derive(Default)]
pub struct QaServiceBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    rerank_provider: Option<Arc<dyn RerankProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    prompts: Option<Arc<dyn PromptSelector>>,
}

impl QaServiceBuilder {
    /// Set the service configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use one provider for embedding, reranking and generation.
    pub fn provider<P: ModelProvider + 'static>(self, provider: Arc<P>) -> Self {
        self.embedding_provider(provider.clone())
            .rerank_provider(provider.clone())
            .generation_provider(provider)
    }

    /// Set the embedding provider. Must match the one used at ingestion.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the rerank provider.
    pub fn rerank_provider(mut self, provider: Arc<dyn RerankProvider>) -> Self {
        self.rerank_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the index to search.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the prompt selector. Defaults to a [`KeywordPromptSelector`] with
    /// no intents.
    pub fn prompt_selector(mut self, prompts: Arc<dyn PromptSelector>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Build the [`QaService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<QaService> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let rerank_provider = self
            .rerank_provider
            .ok_or_else(|| RagError::ConfigError("rerank_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let prompts = self.prompts.unwrap_or_else(|| Arc::new(KeywordPromptSelector::new()));

        Ok(QaService {
            retriever: Retriever::new(Embedder::new(embedding_provider, &config), vector_store),
            reranker: RerankStage::new(rerank_provider),
            generator: GenerationStage::new(generation_provider),
            prompts,
            config,
        })
    }
}
