//! docqa: question answering over a folder of PDFs.
//!
//! `ingest` builds an index file, `ask` answers one question from it, and
//! `run-tests`, `evaluate` and `summary` drive the evaluation harness.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Retrieval-augmented question answering over PDF collections
#[derive(Parser, Debug)]
#[command(name = "docqa", version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Embedding backend; must match the one used to build the index
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::Hashing)]
    embedder: EmbedderKind,

    /// Embedding model name for the openai backend
    #[arg(long, global = true, env = "DOCQA_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Embedding dimensionality
    #[arg(long, global = true, env = "DOCQA_EMBEDDING_DIMENSIONS")]
    embedding_dimensions: Option<usize>,

    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, chunk and embed every PDF in a directory into an index file
    Ingest {
        /// Directory containing the PDFs
        #[arg(long)]
        dir: PathBuf,
        /// Index file to write
        #[arg(long)]
        index: PathBuf,
    },
    /// Answer a question from an index file
    Ask {
        #[arg(long)]
        index: PathBuf,
        #[command(flatten)]
        generation: GenerationArgs,
        /// The question to answer
        question: String,
    },
    /// Answer every question in a dataset and checkpoint the results
    RunTests {
        #[arg(long)]
        index: PathBuf,
        /// Dataset of {question, answer} rows (JSON array or JSON Lines)
        #[arg(long)]
        dataset: PathBuf,
        /// Results file, created or extended in place
        #[arg(long)]
        output: PathBuf,
        /// Label stored with each new record
        #[arg(long)]
        test_settings: Option<String>,
        /// Log each question with its generated and true answers
        #[arg(short, long)]
        verbose: bool,
        /// Record failures and continue instead of stopping
        #[arg(long)]
        keep_going: bool,
        #[command(flatten)]
        generation: GenerationArgs,
    },
    /// Score generated answers with a judge model
    Evaluate {
        /// Results file written by run-tests
        #[arg(long)]
        answers: PathBuf,
        /// Evaluator name used in the eval_score_<name> keys
        #[arg(long)]
        evaluator: String,
        /// Judge chat model
        #[arg(long, env = "DOCQA_JUDGE_MODEL")]
        judge_model: Option<String>,
        /// Custom judge template using {instruction}, {response} and {reference_answer}
        #[arg(long)]
        judge_prompt: Option<PathBuf>,
        /// Record failures and continue instead of stopping
        #[arg(long)]
        keep_going: bool,
    },
    /// Print score statistics for one evaluator
    Summary {
        #[arg(long)]
        answers: PathBuf,
        #[arg(long)]
        evaluator: String,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Options for commands that generate answers.
#[derive(clap::Args, Debug, Clone)]
struct GenerationArgs {
    /// Chat model used for answers
    #[arg(long, env = "DOCQA_CHAT_MODEL")]
    model: Option<String>,

    /// Second-stage reranker
    #[arg(long, value_enum, default_value_t = RerankerKind::None)]
    reranker: RerankerKind,

    /// Base URL of a /rerank endpoint, for --reranker api
    #[arg(long, env = "DOCQA_RERANK_URL")]
    rerank_url: Option<String>,

    /// Model name sent to the rerank endpoint
    #[arg(long, env = "DOCQA_RERANK_MODEL")]
    rerank_model: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EmbedderKind {
    /// Offline feature hashing
    Hashing,
    /// OpenAI-compatible /embeddings endpoint
    Openai,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum RerankerKind {
    None,
    /// BM25 over the retrieved candidates
    Lexical,
    /// Hosted /rerank endpoint
    Api,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docqa=info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => {
            registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)).init();
        }
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    commands::run(cli).await
}
