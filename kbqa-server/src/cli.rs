use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "kbqa",
    version,
    about = "Build a knowledge index from extracted documents and answer questions over it"
)]
pub struct Cli {
    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Vector index file written by `ingest` and read by every other command.
    #[arg(
        long,
        env = "KBQA_INDEX_PATH",
        default_value = "data/vector_store/index.json",
        global = true
    )]
    pub index_path: PathBuf,

    /// Log output format.
    #[arg(
        long,
        env = "KBQA_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load extracted documents, embed them and rebuild the index.
    Ingest {
        /// Directory holding the extraction service's JSON output.
        #[arg(long, env = "KBQA_DOCUMENTS_DIR", default_value = "data/processed")]
        documents_dir: PathBuf,
    },
    /// Answer one question and print the structured answer as JSON.
    Ask {
        question: String,
    },
    /// Answer every question in a JSON file and write the answers to another.
    Batch {
        /// JSON array of `{"text": ...}` question records.
        #[arg(long)]
        input: PathBuf,
        /// Where to write the JSON array of answers.
        #[arg(long)]
        output: PathBuf,
    },
    /// Interactive question loop. Type `exit` or `quit` to leave.
    Chat,
    /// Serve the HTTP API.
    Serve {
        #[arg(long, env = "KBQA_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "KBQA_PORT", default_value_t = 8000)]
        port: u16,
    },
}

/// DashScope connection settings.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// DashScope API key.
    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Override the DashScope API base URL.
    #[arg(long, env = "DASHSCOPE_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[arg(long, env = "KBQA_EMBEDDING_MODEL", default_value = "text-embedding-v2", global = true)]
    pub embedding_model: String,

    #[arg(long, env = "KBQA_RERANK_MODEL", default_value = "gte-rerank", global = true)]
    pub rerank_model: String,

    #[arg(long, env = "KBQA_GENERATION_MODEL", default_value = "qwen-turbo", global = true)]
    pub generation_model: String,

    /// Seconds before a provider request times out.
    #[arg(long, env = "KBQA_REQUEST_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,
}

/// Chunking, retrieval and retry settings.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, env = "KBQA_CHUNK_SIZE", default_value_t = 500, global = true)]
    pub chunk_size: usize,

    #[arg(long, env = "KBQA_CHUNK_OVERLAP", default_value_t = 50, global = true)]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, env = "KBQA_TOP_K", default_value_t = 20, global = true)]
    pub top_k: usize,

    /// Chunks kept after reranking; 0 disables reranking.
    #[arg(long, env = "KBQA_RERANK_TOP_N", default_value_t = 5, global = true)]
    pub rerank_top_n: usize,

    /// Texts per embedding request.
    #[arg(long, env = "KBQA_EMBED_BATCH_SIZE", default_value_t = 25, global = true)]
    pub embed_batch_size: usize,

    /// Attempts per embedding request before giving up.
    #[arg(long, env = "KBQA_MAX_ATTEMPTS", default_value_t = 5, global = true)]
    pub max_attempts: u32,

    /// Base retry delay in milliseconds, multiplied by the attempt number.
    #[arg(long, env = "KBQA_RETRY_BASE_MS", default_value_t = 5000, global = true)]
    pub retry_base_ms: u64,

    /// Embedding batches or batch questions processed at once.
    #[arg(long, env = "KBQA_CONCURRENCY", default_value_t = 1, global = true)]
    pub concurrency: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_batch_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "kbqa", "batch", "--input", "q.json", "--output", "a.json", "--top-k", "7",
        ])
        .unwrap();
        assert_eq!(cli.pipeline.top_k, 7);
        match cli.command {
            Commands::Batch { input, output } => {
                assert_eq!(input, PathBuf::from("q.json"));
                assert_eq!(output, PathBuf::from("a.json"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
