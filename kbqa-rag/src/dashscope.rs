//! DashScope provider using the text-embedding, text-rerank and
//! text-generation REST APIs.
//!
//! This module is only available when the `dashscope` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::provider::{EmbeddingProvider, GenerationProvider, RerankProvider};

/// The default DashScope API base URL.
pub const DASHSCOPE_API_BASE: &str = "https://dashscope.aliyuncs.com/api/v1";

const EMBEDDING_PATH: &str = "/services/embeddings/text-embedding/text-embedding";
const RERANK_PATH: &str = "/services/rerank/text-rerank/text-rerank";
const GENERATION_PATH: &str = "/services/aigc/text-generation/generation";

/// Connection and model settings for [`DashScopeProvider`].
#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// API base URL, without a trailing slash.
    pub base_url: String,
    /// Embedding model, e.g. `text-embedding-v2`.
    pub embedding_model: String,
    /// Rerank model, e.g. `gte-rerank`.
    pub rerank_model: String,
    /// Generation model, e.g. `qwen-turbo`.
    pub generation_model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl DashScopeConfig {
    /// Create a config with the given API key and default models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DASHSCOPE_API_BASE.to_string(),
            embedding_model: "text-embedding-v2".to_string(),
            rerank_model: "gte-rerank".to_string(),
            generation_model: "qwen-turbo".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read the API key from the `DASHSCOPE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DASHSCOPE_API_KEY").map_err(|_| {
            RagError::ConfigError("DASHSCOPE_API_KEY environment variable not set".into())
        })?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Override the rerank model.
    pub fn with_rerank_model(mut self, model: impl Into<String>) -> Self {
        self.rerank_model = model.into();
        self
    }

    /// Override the generation model.
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A [`ModelProvider`](crate::ModelProvider) backed by the DashScope API.
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::dashscope::{DashScopeConfig, DashScopeProvider};
///
/// let provider = DashScopeProvider::new(DashScopeConfig::from_env()?)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct DashScopeProvider {
    client: reqwest::Client,
    config: DashScopeConfig,
}

impl DashScopeProvider {
    /// Create a new provider.
    pub fn new(config: DashScopeConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::ConfigError("DashScope API key must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::provider("DashScope", format!("failed to build client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Return the provider configuration.
    pub fn config(&self) -> &DashScopeConfig {
        &self.config
    }

    async fn post<B, R>(&self, operation: &str, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let provider = format!("DashScope/{operation}");
        let url = format!("{}{path}", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = %provider, error = %e, "request failed");
                RagError::provider(&provider, format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or(body);

            error!(provider = %provider, %status, "API error");
            return Err(RagError::provider(&provider, format!("API returned {status}: {detail}")));
        }

        response.json().await.map_err(|e| {
            error!(provider = %provider, error = %e, "failed to parse response");
            RagError::provider(&provider, format!("failed to parse response: {e}"))
        })
    }
}

// ── DashScope API request/response types ───────────────────────────

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Serialize)]
struct EmbeddingInput<'a> {
    texts: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    output: Option<EmbeddingOutput>,
}

#[derive(Deserialize)]
struct EmbeddingOutput {
    #[serde(default)]
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    text_index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    input: RerankInput<'a>,
    parameters: RerankParameters,
}

#[derive(Serialize)]
struct RerankInput<'a> {
    query: &'a str,
    documents: &'a [&'a str],
}

#[derive(Serialize)]
struct RerankParameters {
    top_n: usize,
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    output: RerankOutput,
}

#[derive(Deserialize)]
struct RerankOutput {
    results: Vec<RerankData>,
}

#[derive(Deserialize)]
struct RerankData {
    index: usize,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationInput<'a> {
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct GenerationParameters {
    result_format: &'static str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    output: GenerationOutput,
}

#[derive(Deserialize)]
struct GenerationOutput {
    choices: Vec<GenerationChoice>,
}

#[derive(Deserialize)]
struct GenerationChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

// ── Capability implementations ─────────────────────────────────────

#[async_trait]
impl EmbeddingProvider for DashScopeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "DashScope", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::provider("DashScope/embed", "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "DashScope",
            batch_size = texts.len(),
            model = %self.config.embedding_model,
            "embedding batch"
        );

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: EmbeddingInput { texts },
        };
        let response: EmbeddingResponse = self.post("embed", EMBEDDING_PATH, &request).await?;

        let mut data = response.output.map(|o| o.embeddings).unwrap_or_default();
        data.sort_by_key(|d| d.text_index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }
}

#[async_trait]
impl RerankProvider for DashScopeProvider {
    async fn rerank(&self, query: &str, documents: &[&str], top_n: usize) -> Result<Vec<usize>> {
        debug!(
            provider = "DashScope",
            documents = documents.len(),
            top_n,
            model = %self.config.rerank_model,
            "reranking"
        );

        let request = RerankRequest {
            model: &self.config.rerank_model,
            input: RerankInput { query, documents },
            parameters: RerankParameters { top_n, return_documents: false },
        };
        let response: RerankResponse = self.post("rerank", RERANK_PATH, &request).await?;
        Ok(response.output.results.into_iter().map(|r| r.index).collect())
    }
}

#[async_trait]
impl GenerationProvider for DashScopeProvider {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        debug!(
            provider = "DashScope",
            prompt_len = prompt.len(),
            model = %self.config.generation_model,
            "generating"
        );

        let request = GenerationRequest {
            model: &self.config.generation_model,
            input: GenerationInput {
                messages: vec![
                    ChatMessage { role: "system", content: system_prompt },
                    ChatMessage { role: "user", content: prompt },
                ],
            },
            parameters: GenerationParameters { result_format: "message" },
        };
        let response: GenerationResponse = self.post("generate", GENERATION_PATH, &request).await?;
        response
            .output
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RagError::provider("DashScope/generate", "API returned no choices"))
    }
}
