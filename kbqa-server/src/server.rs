use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kbqa_rag::{QaService, RagError, StructuredAnswer, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

pub const DEFAULT_TOP_K: i64 = 20;
pub const DEFAULT_RERANK_TOP_N: i64 = 5;

#[derive(Clone)]
pub struct AppState {
    pub qa: Arc<QaService>,
}

impl AppState {
    pub fn new(qa: Arc<QaService>) -> Self {
        Self { qa }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

/// Body of `POST /api/ask`.
///
/// Limits are signed so that negative values from clients are clamped to
/// zero instead of rejected: `top_k = 0` yields the no-results answer and
/// `rerank_top_n = 0` skips reranking.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AskRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_rerank_top_n")]
    pub rerank_top_n: i64,
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K
}

fn default_rerank_top_n() -> i64 {
    DEFAULT_RERANK_TOP_N
}

impl AskRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), top_k: DEFAULT_TOP_K, rerank_top_n: DEFAULT_RERANK_TOP_N }
    }

    fn limits(&self) -> (usize, usize) {
        (clamp_limit(self.top_k), clamp_limit(self.rerank_top_n))
    }
}

fn clamp_limit(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/ask", post(ask))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(state: AppState, config: ServerConfig) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid host/port {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("kbqa listening on http://{}", addr);
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}

async fn root() -> impl IntoResponse {
    Json(json!({"message": "Welcome to the kbqa knowledge base API. The service is running."}))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let chunks = state.qa.vector_store().len().await.ok();
    Json(json!({"status": "ok", "service": "kbqa", "indexed_chunks": chunks}))
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<StructuredAnswer>, (StatusCode, Json<ErrorBody>)> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let (top_k, rerank_top_n) = request.limits();

    match state.qa.ask(&request.query, top_k, rerank_top_n).await {
        Ok(answer) => Ok(Json(answer)),
        Err(RagError::InputError(message)) => Err(bad_request(message)),
        Err(e) => {
            error!(error = %e, "ask failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { message: e.to_string() })))
        }
    }
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { message: message.into() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limits_clamp_to_zero() {
        let request: AskRequest =
            serde_json::from_str(r#"{"query": "q", "top_k": -3, "rerank_top_n": -1}"#).unwrap();
        assert_eq!(request.limits(), (0, 0));
    }

    #[test]
    fn missing_limits_use_defaults() {
        let request: AskRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        assert_eq!(request.limits(), (20, 5));
    }
}
