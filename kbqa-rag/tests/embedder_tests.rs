//! Tests for batched, retrying embedding.

mod common;

use std::sync::Arc;

use common::{MockProvider, embed_text, test_config};
use kbqa_rag::{Embedder, RagConfig, RagError, RetryPolicy};

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("chunk number {i}")).collect()
}

fn embedder(provider: &Arc<MockProvider>, config: &RagConfig) -> Embedder {
    Embedder::new(provider.clone(), config)
}

#[tokio::test]
async fn test_partitions_into_provider_sized_batches() {
    let provider = Arc::new(MockProvider::new());
    let vectors = embedder(&provider, &test_config()).embed_batch(&texts(5)).await.unwrap();

    assert_eq!(vectors.len(), 5);
    assert_eq!(*provider.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
}

#[tokio::test]
async fn test_vectors_follow_input_order() {
    let provider = Arc::new(MockProvider::new());
    let inputs = texts(7);
    let vectors = embedder(&provider, &test_config()).embed_batch(&inputs).await.unwrap();

    let expected: Vec<Vec<f32>> = inputs.iter().map(|t| embed_text(t)).collect();
    assert_eq!(vectors, expected);
}

#[tokio::test]
async fn test_transient_failure_is_retried_without_resending_earlier_batches() {
    let provider = Arc::new(MockProvider::new().failing(2));
    let vectors = embedder(&provider, &test_config()).embed_batch(&texts(4)).await.unwrap();

    assert_eq!(vectors.len(), 4);
    // First batch fails twice then succeeds, second succeeds at once.
    assert_eq!(MockProvider::calls(&provider.batch_calls), 4);
}

#[tokio::test]
async fn test_aborts_after_retry_budget_is_exhausted() {
    let provider = Arc::new(MockProvider::new().failing(usize::MAX));
    let err = embedder(&provider, &test_config()).embed_batch(&texts(4)).await.unwrap_err();

    assert!(matches!(err, RagError::ProviderError { .. }));
    assert_eq!(MockProvider::calls(&provider.batch_calls), 5);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_linear_in_attempt_number() {
    let provider = Arc::new(MockProvider::new().failing(3));
    let config = RagConfig::builder()
        .retry(RetryPolicy { max_attempts: 5, base_delay_ms: 1_000 })
        .build()
        .unwrap();

    let started = tokio::time::Instant::now();
    embedder(&provider, &config).embed_batch(&texts(1)).await.unwrap();

    // 1s + 2s + 3s of waiting before the fourth attempt succeeds.
    assert_eq!(started.elapsed().as_secs(), 6);
}

#[tokio::test]
async fn test_empty_batch_response_is_accepted() {
    let provider = Arc::new(MockProvider::new().with_empty_batches());
    let embedder = embedder(&provider, &test_config());

    let aligned = embedder.embed_aligned(&texts(3)).await.unwrap();
    assert_eq!(aligned, vec![None, None, None]);
    assert!(embedder.embed_batch(&texts(3)).await.unwrap().is_empty());
    assert_eq!(MockProvider::calls(&provider.batch_calls), 4);
}

#[tokio::test]
async fn test_single_item_batch_matches_single_embedding() {
    let provider = Arc::new(MockProvider::new());
    let embedder = embedder(&provider, &test_config());

    for text in ["revenue grew 12%", "营收增长", ""] {
        let batch = embedder.embed_batch(&[text.to_string()]).await.unwrap();
        let single = embedder.embed_single(text).await.unwrap();
        assert_eq!(batch, vec![single]);
    }
}

#[tokio::test]
async fn test_single_embedding_retries_then_fails() {
    let provider = Arc::new(MockProvider::new().failing(usize::MAX));
    let err = embedder(&provider, &test_config()).embed_single("q").await.unwrap_err();

    assert!(matches!(err, RagError::ProviderError { .. }));
    assert_eq!(MockProvider::calls(&provider.embed_calls), 5);
}

#[tokio::test]
async fn test_concurrent_batches_keep_input_order() {
    let provider = Arc::new(MockProvider::new().with_slow_marker("slow"));
    let config = RagConfig::builder()
        .embed_batch_size(1)
        .concurrency(4)
        .retry(RetryPolicy::immediate(5))
        .build()
        .unwrap();
    let inputs: Vec<String> =
        vec!["slow first".into(), "second".into(), "third".into(), "slow fourth".into()];

    let vectors = embedder(&provider, &config).embed_batch(&inputs).await.unwrap();

    let expected: Vec<Vec<f32>> = inputs.iter().map(|t| embed_text(t)).collect();
    assert_eq!(vectors, expected);
}

#[tokio::test]
async fn test_no_texts_makes_no_calls() {
    let provider = Arc::new(MockProvider::new());
    assert!(embedder(&provider, &test_config()).embed_batch(&[]).await.unwrap().is_empty());
    assert_eq!(MockProvider::calls(&provider.batch_calls), 0);
}

#[tokio::test]
async fn test_overrides_replace_configured_batch_size_and_retry() {
    let provider = Arc::new(MockProvider::new().failing(usize::MAX));
    let embedder = embedder(&provider, &test_config())
        .with_batch_size(3)
        .with_retry(RetryPolicy::immediate(2));

    let err = embedder.embed_batch(&texts(7)).await.unwrap_err();
    assert!(matches!(err, RagError::ProviderError { .. }));
    assert_eq!(MockProvider::calls(&provider.batch_calls), 2);

    let healthy = Arc::new(MockProvider::new());
    let vectors = Embedder::new(healthy.clone(), &test_config())
        .with_batch_size(3)
        .embed_batch(&texts(7))
        .await
        .unwrap();
    assert_eq!(vectors.len(), 7);
    assert_eq!(*healthy.batch_sizes.lock().unwrap(), vec![3, 3, 1]);
}
