use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use kbqa_rag::document::{Chunk, Metadata};
use kbqa_rag::{
    EmbeddingProvider, GenerationProvider, InMemoryVectorStore, QaService, RerankProvider,
    Result, StructuredAnswer, VectorStore,
};
use kbqa_server::{AppState, app_router};
use serde_json::{Value, json};

const MODEL: &str = "stub-embedding";

#[derive(Default)]
struct StubProvider {
    rerank_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for StubProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, text.len() as f32])
    }

    fn model_name(&self) -> &str {
        MODEL
    }
}

#[async_trait]
impl RerankProvider for StubProvider {
    async fn rerank(&self, _query: &str, documents: &[&str], top_n: usize) -> Result<Vec<usize>> {
        self.rerank_calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..documents.len()).take(top_n).collect())
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    async fn generate(&self, _system_prompt: &str, _prompt: &str) -> Result<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(r#"```json
{"reasoning_steps": ["read"], "reasoning_summary": "s", "relevant_context": "c", "final_answer": "12%"}
```"#
            .to_string())
    }
}

async fn indexed_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let chunks: Vec<Chunk> = ["revenue grew 12%", "margin fell", "cash rose", "costs flat"]
        .iter()
        .map(|text| {
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), "report.json".into());
            Chunk { content: text.to_string(), metadata }
        })
        .collect();
    let vectors = chunks.iter().map(|c| vec![1.0, c.content.len() as f32]).collect();
    store.rebuild(MODEL, chunks, vectors).await.expect("rebuild index");
    store
}

async fn spawn_server(
    store: Arc<InMemoryVectorStore>,
) -> (String, Arc<StubProvider>, tokio::task::JoinHandle<()>) {
    let provider = Arc::new(StubProvider::default());
    let qa = QaService::builder()
        .provider(provider.clone())
        .vector_store(store)
        .build()
        .expect("build service");
    let app = app_router(AppState::new(Arc::new(qa)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), provider, handle)
}

#[tokio::test]
async fn root_and_health_respond() {
    let (base, _provider, handle) = spawn_server(indexed_store().await).await;
    let client = reqwest::Client::new();

    let root: Value = client
        .get(format!("{}/", base))
        .send()
        .await
        .expect("root response")
        .json()
        .await
        .expect("root json");
    assert!(root.get("message").and_then(Value::as_str).is_some());

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("health response")
        .json()
        .await
        .expect("health json");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["indexed_chunks"], 4);

    handle.abort();
}

#[tokio::test]
async fn ask_returns_structured_answer() {
    let (base, provider, handle) = spawn_server(indexed_store().await).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "how much did revenue grow?", "top_k": 3, "rerank_top_n": 2}))
        .send()
        .await
        .expect("ask response");
    assert!(response.status().is_success());

    let answer: StructuredAnswer = response.json().await.expect("answer json");
    assert_eq!(answer.final_answer, "12%");
    assert_eq!(answer.reasoning_steps, vec!["read"]);
    assert_eq!(answer.raw_context.len(), 2);
    assert!(answer.raw_context[0].metadata.contains_key("score"));
    assert_eq!(provider.rerank_calls.load(Ordering::SeqCst), 1);

    handle.abort();
}

#[tokio::test]
async fn ask_uses_default_limits() {
    let (base, _provider, handle) = spawn_server(indexed_store().await).await;
    let client = reqwest::Client::new();

    let answer: StructuredAnswer = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "revenue"}))
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .expect("answer json");

    // Four chunks retrieved with top_k 20, five kept by rerank.
    assert_eq!(answer.raw_context.len(), 4);

    handle.abort();
}

#[tokio::test]
async fn empty_query_is_bad_request() {
    let (base, provider, handle) = spawn_server(indexed_store().await).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "   "}))
        .send()
        .await
        .expect("ask response");

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error json");
    assert!(body.get("message").is_some());
    assert_eq!(provider.generate_calls.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn negative_limits_are_clamped() {
    let (base, provider, handle) = spawn_server(indexed_store().await).await;
    let client = reqwest::Client::new();

    let no_results: StructuredAnswer = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "revenue", "top_k": -1}))
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .expect("answer json");
    assert_eq!(no_results, StructuredAnswer::no_results());

    let unreranked: StructuredAnswer = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "revenue", "top_k": 3, "rerank_top_n": -5}))
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .expect("answer json");
    assert_eq!(unreranked.raw_context.len(), 3);
    assert_eq!(provider.rerank_calls.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn empty_index_answers_with_no_results() {
    let (base, provider, handle) = spawn_server(Arc::new(InMemoryVectorStore::new())).await;
    let client = reqwest::Client::new();

    let answer: StructuredAnswer = client
        .post(format!("{}/api/ask", base))
        .json(&json!({"query": "anything"}))
        .send()
        .await
        .expect("ask response")
        .json()
        .await
        .expect("answer json");

    assert_eq!(answer, StructuredAnswer::no_results());
    assert_eq!(provider.generate_calls.load(Ordering::SeqCst), 0);

    handle.abort();
}
