//! Subcommand implementations for the `kbqa` binary.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use kbqa_rag::{
    DashScopeConfig, DashScopeProvider, InMemoryVectorStore, IngestionPipeline,
    JsonDirectoryLoader, QaService, RagConfig, RetryPolicy, StructuredAnswer, VectorStore,
    run_batch,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use crate::cli::{Cli, Commands, PipelineArgs, ProviderArgs};
use crate::server::{AppState, ServerConfig, run_server};

/// Run the parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = rag_config(&cli.pipeline)?;
    let provider = Arc::new(dashscope_provider(&cli.provider)?);

    match cli.command {
        Commands::Ingest { documents_dir } => {
            ingest(provider, config, &documents_dir, &cli.index_path).await
        }
        Commands::Ask { question } => {
            let qa = open_service(provider, config, &cli.index_path).await?;
            let answer = qa.ask_default(&question).await?;
            println!("{}", serde_json::to_string_pretty(&answer)?);
            Ok(())
        }
        Commands::Batch { input, output } => {
            let qa = open_service(provider, config, &cli.index_path).await?;
            let summary = run_batch(&qa, &input, &output)
                .await
                .with_context(|| format!("batch over {} failed", input.display()))?;
            println!(
                "answered {} of {} questions, written to {}",
                summary.answered,
                summary.questions,
                output.display()
            );
            Ok(())
        }
        Commands::Chat => {
            let qa = open_service(provider, config, &cli.index_path).await?;
            chat(&qa).await
        }
        Commands::Serve { host, port } => {
            let qa = open_service(provider, config, &cli.index_path).await?;
            run_server(AppState::new(Arc::new(qa)), ServerConfig { host, port }).await
        }
    }
}

/// Build a validated [`RagConfig`] from command-line settings.
pub fn rag_config(args: &PipelineArgs) -> anyhow::Result<RagConfig> {
    RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .top_k(args.top_k)
        .rerank_top_n(args.rerank_top_n)
        .embed_batch_size(args.embed_batch_size)
        .retry(RetryPolicy { max_attempts: args.max_attempts, base_delay_ms: args.retry_base_ms })
        .concurrency(args.concurrency)
        .build()
        .context("invalid pipeline settings")
}

/// Build the DashScope provider from command-line settings.
pub fn dashscope_provider(args: &ProviderArgs) -> anyhow::Result<DashScopeProvider> {
    let api_key = args
        .api_key
        .clone()
        .ok_or_else(|| anyhow!("DASHSCOPE_API_KEY must be set (or pass --api-key)"))?;
    let mut config = DashScopeConfig::new(api_key)
        .with_embedding_model(&args.embedding_model)
        .with_rerank_model(&args.rerank_model)
        .with_generation_model(&args.generation_model)
        .with_timeout(Duration::from_secs(args.timeout_secs.max(1)));
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    DashScopeProvider::new(config).context("failed to create DashScope provider")
}

async fn ingest(
    provider: Arc<DashScopeProvider>,
    config: RagConfig,
    documents_dir: &Path,
    index_path: &Path,
) -> anyhow::Result<()> {
    let documents = JsonDirectoryLoader::new(documents_dir)
        .load()
        .await
        .with_context(|| format!("failed to load documents from {}", documents_dir.display()))?;

    let pipeline = IngestionPipeline::builder()
        .config(config)
        .embedding_provider(provider)
        .vector_store(Arc::new(InMemoryVectorStore::persistent(index_path)))
        .build()?;
    let index = pipeline.ingest(documents).await.context("ingestion aborted")?;

    let chunk_count = index.len().await?;
    info!(chunk_count, index = %index_path.display(), "index rebuilt");
    println!("indexed {chunk_count} chunks into {}", index_path.display());
    Ok(())
}

/// Open the index at `index_path` and build the question-answering service.
///
/// A missing or unreadable index is not fatal: the service starts over an
/// empty index and answers every question with the no-results answer until
/// `kbqa ingest` has been run.
pub async fn open_service(
    provider: Arc<DashScopeProvider>,
    config: RagConfig,
    index_path: &Path,
) -> anyhow::Result<QaService> {
    let store = match InMemoryVectorStore::open(index_path).await {
        Ok(store) => store,
        Err(e) => {
            warn!(error = %e, "index unavailable; run `kbqa ingest` to build it");
            InMemoryVectorStore::new()
        }
    };

    let qa = QaService::builder()
        .config(config)
        .provider(provider)
        .vector_store(Arc::new(store))
        .build()?;
    Ok(qa)
}

async fn chat(qa: &QaService) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;
    println!("Ask a question about the knowledge base. Type `exit` or `quit` to leave.");

    loop {
        let line = tokio::task::block_in_place(|| editor.readline("question> "));
        let question = match line {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let question = question.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        if let Err(e) = editor.add_history_entry(question) {
            debug!(error = %e, "failed to record chat history");
        }

        match qa.ask_default(question).await {
            Ok(answer) => print_answer(&answer),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("bye");
    Ok(())
}

fn print_answer(answer: &StructuredAnswer) {
    println!("\n{}\n", answer.final_answer);
    if !answer.reasoning_summary.is_empty() {
        println!("reasoning: {}", answer.reasoning_summary);
    }
    for (i, record) in answer.raw_context.iter().enumerate() {
        let source = record.metadata.get("source").and_then(|v| v.as_str()).unwrap_or("unknown");
        println!("  [{}] {source}", i + 1);
    }
    println!();
}
