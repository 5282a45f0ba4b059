//! Subcommand handlers and component wiring.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use docqa_eval::{
    ErrorPolicy, EvaluateOptions, JudgePrompt, RunOptions, evaluate_answers, load_eval_dataset,
    load_records, run_tests, summarize,
};
use docqa_rag::hashing::DEFAULT_DIMENSIONS;
use docqa_rag::{
    ApiReranker, EmbeddingProvider, Generator, HashingEmbedder, InMemoryIndex, LexicalReranker,
    OpenAIChatModel, OpenAIEmbeddingProvider, RagConfig, RagPipeline, Reranker, RetryPolicy,
    Retrying,
};
use tracing::info;

use crate::{Cli, Command, EmbedderKind, GenerationArgs, RerankerKind};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => RagConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RagConfig::default(),
    };

    match cli.command {
        Command::Ingest { ref dir, ref index } => {
            let embedder = embedder(&cli)?;
            ingest(config, embedder, dir, index).await
        }
        Command::Ask { ref index, ref generation, ref question } => {
            let pipeline = answering_pipeline(&cli, config, index, generation)?;
            let answer = pipeline.answer(question).await?;

            println!("{}", answer.answer);
            println!();
            for (i, passage) in answer.context.iter().enumerate() {
                println!("[{i}] {}", first_line(passage));
            }
            Ok(())
        }
        Command::RunTests {
            ref index,
            ref dataset,
            ref output,
            ref test_settings,
            verbose,
            keep_going,
            ref generation,
        } => {
            let pipeline = answering_pipeline(&cli, config, index, generation)?;
            let examples = load_eval_dataset(dataset)?;
            let options = RunOptions {
                test_settings: test_settings.clone(),
                verbose,
                error_policy: policy(keep_going),
            };

            let report = run_tests(&examples, &pipeline, output, &options).await?;
            println!(
                "processed {}, skipped {}, failed {}",
                report.processed,
                report.skipped,
                report.failures.len()
            );
            Ok(())
        }
        Command::Evaluate { answers, evaluator, judge_model, judge_prompt, keep_going } => {
            let judge = chat_model(judge_model.as_deref())?;
            let prompt = match judge_prompt {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading judge prompt {}", path.display()))?;
                    JudgePrompt::new(raw)?
                }
                None => JudgePrompt::default(),
            };
            let options = EvaluateOptions { error_policy: policy(keep_going) };

            let report =
                evaluate_answers(&answers, judge.as_ref(), &evaluator, &prompt, &options).await?;
            println!(
                "scored {}, already scored {}, failed {}",
                report.processed,
                report.skipped,
                report.failures.len()
            );
            Ok(())
        }
        Command::Summary { answers, evaluator, json } => {
            let records = load_records(&answers)?;
            let summary = summarize(&records, &evaluator);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
            Ok(())
        }
    }
}

async fn ingest(
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    dir: &Path,
    index_path: &Path,
) -> anyhow::Result<()> {
    let index = Arc::new(InMemoryIndex::new(embedder.dimensions()));
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .index(index.clone())
        .build()?;

    let stats = pipeline.ingest_directory(dir).await?;
    index.save(index_path).await?;

    info!(
        files = stats.files,
        pages = stats.pages,
        chunk_count = stats.total_chunks(),
        index = %index_path.display(),
        "ingestion finished"
    );
    println!(
        "indexed {} chunks ({} text, {} table) from {} pages in {} files",
        stats.total_chunks(),
        stats.text_chunks,
        stats.table_chunks,
        stats.pages,
        stats.files
    );
    Ok(())
}

fn answering_pipeline(
    cli: &Cli,
    config: RagConfig,
    index_path: &Path,
    generation: &GenerationArgs,
) -> anyhow::Result<RagPipeline> {
    let index = InMemoryIndex::load(index_path)
        .with_context(|| format!("loading index {}", index_path.display()))?;

    let mut builder = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder(cli)?)
        .index(Arc::new(index))
        .generator(chat_model(generation.model.as_deref())?);
    if let Some(reranker) = reranker(generation)? {
        builder = builder.reranker(reranker);
    }
    Ok(builder.build()?)
}

fn embedder(cli: &Cli) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match cli.embedder {
        EmbedderKind::Hashing => {
            let dimensions = cli.embedding_dimensions.unwrap_or(DEFAULT_DIMENSIONS);
            Arc::new(HashingEmbedder::new(dimensions)?)
        }
        EmbedderKind::Openai => {
            let mut provider = OpenAIEmbeddingProvider::from_env()?;
            if let Some(model) = &cli.embedding_model {
                provider = provider.with_model(model);
            }
            if let Some(dimensions) = cli.embedding_dimensions {
                provider = provider.with_dimensions(dimensions);
            }
            Arc::new(Retrying::new(provider, RetryPolicy::default()))
        }
    };
    Ok(embedder)
}

fn chat_model(model: Option<&str>) -> anyhow::Result<Arc<dyn Generator>> {
    let mut chat = OpenAIChatModel::from_env()?;
    if let Some(model) = model {
        chat = chat.with_model(model);
    }
    Ok(Arc::new(Retrying::new(chat, RetryPolicy::default())))
}

fn reranker(args: &GenerationArgs) -> anyhow::Result<Option<Arc<dyn Reranker>>> {
    let reranker: Arc<dyn Reranker> = match args.reranker {
        RerankerKind::None => return Ok(None),
        RerankerKind::Lexical => Arc::new(LexicalReranker::default()),
        RerankerKind::Api => {
            let Some(url) = &args.rerank_url else {
                bail!("--reranker api needs --rerank-url or DOCQA_RERANK_URL");
            };
            let mut reranker = ApiReranker::new(url);
            if let Ok(key) = std::env::var("DOCQA_RERANK_API_KEY") {
                reranker = reranker.with_api_key(key);
            }
            if let Some(model) = &args.rerank_model {
                reranker = reranker.with_model(model);
            }
            Arc::new(reranker)
        }
    };
    Ok(Some(reranker))
}

fn policy(keep_going: bool) -> ErrorPolicy {
    if keep_going { ErrorPolicy::Continue } else { ErrorPolicy::Abort }
}

fn first_line(passage: &str) -> &str {
    passage.lines().next().unwrap_or_default()
}
