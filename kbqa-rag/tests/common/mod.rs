//! In-process provider doubles shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kbqa_rag::{
    Document, EmbeddingProvider, GenerationProvider, InMemoryVectorStore, IngestionPipeline,
    RagConfig, RagError, RerankProvider, Result, RetryPolicy,
};

pub const DIM: usize = 8;
pub const MODEL: &str = "mock-embedding";

pub const VALID_ANSWER: &str = r#"{
    "reasoning_steps": ["found the figure"],
    "reasoning_summary": "the report states it",
    "relevant_context": "revenue grew",
    "final_answer": "a"
}"#;

/// Deterministic, never-zero embedding derived from character codes.
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = 1.0;
    for c in text.chars() {
        v[(c as usize) % DIM] += 1.0;
    }
    v
}

#[derive(Debug, Clone)]
pub enum RerankBehavior {
    /// Reverse the retrieval order.
    Reverse,
    /// Return these indices verbatim.
    Indices(Vec<usize>),
    Fail,
}

pub struct MockProvider {
    model: String,
    failures: AtomicUsize,
    empty_batches: bool,
    slow_marker: Option<String>,
    rerank: RerankBehavior,
    response: String,
    fail_generation_on: Option<String>,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub rerank_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub prompts: Mutex<Vec<String>>,
    pub reranked_documents: Mutex<Vec<Vec<String>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            model: MODEL.to_string(),
            failures: AtomicUsize::new(0),
            empty_batches: false,
            slow_marker: None,
            rerank: RerankBehavior::Reverse,
            response: VALID_ANSWER.to_string(),
            fail_generation_on: None,
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            rerank_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            reranked_documents: Mutex::new(Vec::new()),
        }
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Fail the next `n` embedding calls.
    pub fn failing(self, n: usize) -> Self {
        self.failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_empty_batches(mut self) -> Self {
        self.empty_batches = true;
        self
    }

    /// Delay any batch whose first text contains `marker`.
    pub fn with_slow_marker(mut self, marker: &str) -> Self {
        self.slow_marker = Some(marker.to_string());
        self
    }

    pub fn with_rerank(mut self, rerank: RerankBehavior) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Fail generation for any prompt containing `needle`.
    pub fn failing_generation_on(mut self, needle: &str) -> Self {
        self.fail_generation_on = Some(needle.to_string());
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(RagError::ProviderError {
                provider: "mock".to_string(),
                message: "embed unavailable".to_string(),
            });
        }
        Ok(embed_text(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());
        if let Some(marker) = &self.slow_marker {
            if texts.first().is_some_and(|t| t.contains(marker.as_str())) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        if self.take_failure() {
            return Err(RagError::ProviderError {
                provider: "mock".to_string(),
                message: "batch unavailable".to_string(),
            });
        }
        if self.empty_batches {
            return Ok(Vec::new());
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl RerankProvider for MockProvider {
    async fn rerank(&self, _query: &str, documents: &[&str], top_n: usize) -> Result<Vec<usize>> {
        self.rerank_calls.fetch_add(1, Ordering::SeqCst);
        self.reranked_documents
            .lock()
            .unwrap()
            .push(documents.iter().map(|d| d.to_string()).collect());
        match &self.rerank {
            RerankBehavior::Reverse => Ok((0..documents.len()).rev().take(top_n).collect()),
            RerankBehavior::Indices(indices) => Ok(indices.clone()),
            RerankBehavior::Fail => Err(RagError::ProviderError {
                provider: "mock".to_string(),
                message: "rerank unavailable".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, _system_prompt: &str, prompt: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(needle) = &self.fail_generation_on {
            if prompt.contains(needle.as_str()) {
                return Err(RagError::ProviderError {
                    provider: "mock".to_string(),
                    message: "generation unavailable".to_string(),
                });
            }
        }
        Ok(self.response.clone())
    }
}

/// Config with test-sized chunks and retries that never sleep.
pub fn test_config() -> RagConfig {
    RagConfig::builder()
        .chunk_size(200)
        .chunk_overlap(20)
        .embed_batch_size(2)
        .retry(RetryPolicy::immediate(5))
        .build()
        .unwrap()
}

pub fn documents(texts: &[&str]) -> Vec<Document> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            Document::new(*text).with_metadata("source", "report.json").with_metadata("seq_num", i + 1)
        })
        .collect()
}

/// Ingest `texts` into a fresh in-memory store using a well-behaved provider.
pub async fn indexed_store(texts: &[&str]) -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let pipeline = IngestionPipeline::builder()
        .config(test_config())
        .embedding_provider(Arc::new(MockProvider::new()))
        .vector_store(store.clone())
        .build()
        .unwrap();
    pipeline.ingest(documents(texts)).await.unwrap();
    store
}
