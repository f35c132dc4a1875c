//! # kbqa-rag
//!
//! Knowledge pipeline for question answering over extracted documents.
//!
//! ## Overview
//!
//! The crate has two halves that share one embedding client:
//!
//! - **Ingestion**: [`JsonDirectoryLoader`] reads extracted documents,
//!   [`RecursiveChunker`] splits them into overlapping chunks, [`Embedder`]
//!   vectorizes them in provider-sized batches with retries, and a
//!   [`VectorStore`] is rebuilt from the result ([`IngestionPipeline`]).
//! - **Query**: [`QaService`] embeds a question, retrieves the nearest chunks
//!   ([`Retriever`]), reorders them with [`RerankStage`], and asks the
//!   generation model for a JSON answer that [`GenerationStage`] turns into a
//!   [`StructuredAnswer`]. Query-time failures degrade into fallback answers
//!   instead of errors.
//!
//! Remote models sit behind the [`EmbeddingProvider`], [`RerankProvider`] and
//! [`GenerationProvider`] traits. [`DashScopeProvider`] implements all three
//! (feature `dashscope`, on by default).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kbqa_rag::{
//!     DashScopeConfig, DashScopeProvider, InMemoryVectorStore, IngestionPipeline,
//!     JsonDirectoryLoader, QaService, RagConfig,
//! };
//!
//! let provider = Arc::new(DashScopeProvider::new(DashScopeConfig::from_env()?)?);
//! let store = Arc::new(InMemoryVectorStore::persistent("data/index.json"));
//!
//! let pipeline = IngestionPipeline::builder()
//!     .embedding_provider(provider.clone())
//!     .vector_store(store.clone())
//!     .build()?;
//! pipeline.ingest(JsonDirectoryLoader::new("data/processed").load().await?).await?;
//!
//! let service = QaService::builder()
//!     .config(RagConfig::default())
//!     .provider(provider)
//!     .vector_store(store)
//!     .build()?;
//! let answer = service.ask_default("What was Q1 revenue?").await?;
//! ```

pub mod answer;
pub mod batch;
pub mod chunking;
pub mod config;
#[cfg(feature = "dashscope")]
pub mod dashscope;
pub mod document;
pub mod embedder;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod loader;
pub mod prompt;
pub mod provider;
pub mod qa;
pub mod rerank;
pub mod retrieval;
pub mod vectorstore;

pub use answer::{ContextRecord, QuestionRecord, StructuredAnswer};
pub use batch::{BatchSummary, read_questions, run_batch, write_answers};
pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder, RetryPolicy};
#[cfg(feature = "dashscope")]
pub use dashscope::{DashScopeConfig, DashScopeProvider};
pub use document::{Chunk, Document, Metadata, ScoredChunk};
pub use embedder::Embedder;
pub use error::{RagError, Result};
pub use generation::GenerationStage;
pub use ingest::{IngestionPipeline, IngestionPipelineBuilder};
pub use inmemory::InMemoryVectorStore;
pub use loader::JsonDirectoryLoader;
pub use prompt::{Intent, KeywordPromptSelector, PromptSelector, PromptSpec};
pub use provider::{EmbeddingProvider, GenerationProvider, ModelProvider, RerankProvider};
pub use qa::{QaService, QaServiceBuilder};
pub use rerank::RerankStage;
pub use retrieval::Retriever;
pub use vectorstore::VectorStore;
