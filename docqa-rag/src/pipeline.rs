//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (extract → embed → index) and
//! question answering (embed → search → rerank or truncate → synthesize)
//! over an [`EmbeddingProvider`], a [`VectorIndex`], an optional
//! [`Reranker`], and a [`Generator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{HashingEmbedder, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbedder::default()))
//!     .generator(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.ingest_directory("./pdfs").await?;
//! let answer = pipeline.answer("What festival does Cannes host?").await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::RagConfig;
use crate::document::{Chunk, ChunkVector, RagAnswer, SearchResult};
use crate::embedding::{EmbeddingProvider, check_dimensions};
use crate::error::{RagError, Result};
use crate::extract::{DocumentExtractor, ExtractionStats, PageSource};
use crate::generation::Generator;
use crate::index::{InMemoryIndex, VectorIndex};
use crate::prompt::PromptTemplate;
use crate::reranker::Reranker;
use crate::synthesis::AnswerSynthesizer;

/// The RAG pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. A pipeline holds no state
/// beyond its index, which may be shared with other pipelines for
/// concurrent read-only use.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    page_source: Option<Arc<dyn PageSource>>,
    synthesizer: Option<AnswerSynthesizer>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the knowledge index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// An extractor using the configured chunk size and overlap.
    pub fn extractor(&self) -> DocumentExtractor {
        match &self.page_source {
            Some(source) => DocumentExtractor::with_source(
                self.config.chunk_size,
                self.config.chunk_overlap,
                source.clone(),
            ),
            None => DocumentExtractor::new(self.config.chunk_size, self.config.chunk_overlap),
        }
    }

    /// Extract every PDF in `dir` and add its chunks to the index.
    ///
    /// # Errors
    ///
    /// Fails without touching the index if any file cannot be read or any
    /// chunk cannot be embedded.
    pub async fn ingest_directory(&self, dir: impl AsRef<Path>) -> Result<ExtractionStats> {
        let dir = dir.as_ref();
        let (chunks, stats) = self.extractor().extract_directory_with_stats(dir).map_err(|e| {
            error!(dir = %dir.display(), error = %e, "extraction failed");
            e
        })?;
        self.index_chunks(chunks).await?;
        Ok(stats)
    }

    /// Embed `chunks` in batches and append them to the index.
    ///
    /// Returns the number of chunks added. Nothing is added unless every
    /// chunk embeds successfully with the expected dimensionality.
    pub async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            info!(chunk_count = 0, "nothing to index");
            return Ok(0);
        }

        let dimensions = self.embedding_provider.dimensions();
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(first_chunk = %batch[0].id, error = %e, "embedding failed during ingestion");
                e
            })?;

            if embeddings.len() != batch.len() {
                return Err(RagError::Embedding {
                    provider: self.embedding_provider.name().to_string(),
                    message: format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                check_dimensions(dimensions, &embedding)?;
                vectors.push(ChunkVector { chunk: chunk.clone(), embedding });
            }
        }

        let chunk_count = vectors.len();
        self.index.add(vectors).await.map_err(|e| {
            error!(error = %e, "index insert failed during ingestion");
            e
        })?;

        info!(chunk_count, index_size = self.index.len().await, "indexed chunks");
        Ok(chunk_count)
    }

    /// Retrieve the passages for `question`: a broad search for
    /// `num_retrieved_docs` candidates narrowed to `num_docs_final`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Pipeline`] naming the failed stage.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let query = self.embedding_provider.embed(question).await.map_err(|e| {
            error!(question, error = %e, "embedding failed during query");
            e.in_stage("embed", question)
        })?;

        let candidates =
            self.index.search(&query, self.config.num_retrieved_docs).await.map_err(|e| {
                error!(question, error = %e, "index search failed");
                e.in_stage("search", question)
            })?;

        let final_k = self.config.num_docs_final;
        let results = match &self.reranker {
            Some(reranker) => {
                reranker.rerank(question, candidates, final_k).await.map_err(|e| {
                    error!(question, reranker = reranker.name(), error = %e, "reranking failed");
                    e.in_stage("rerank", question)
                })?
            }
            None => {
                let mut candidates = candidates;
                candidates.truncate(final_k);
                candidates
            }
        };

        info!(question, result_count = results.len(), "retrieval completed");
        Ok(results)
    }

    /// Answer `question` from retrieved context.
    ///
    /// The returned context is the list of passages given to the model,
    /// after reranking or truncation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Pipeline`] naming the failed stage. A pipeline
    /// built without a generator fails at the `generate` stage.
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let Some(synthesizer) = &self.synthesizer else {
            return Err(RagError::Config("no generator configured".to_string())
                .in_stage("generate", question));
        };

        let results = self.retrieve(question).await?;
        let passages: Vec<String> = results.into_iter().map(|r| r.chunk.text).collect();

        synthesizer.answer(question, passages).await.map_err(|e| {
            error!(question, error = %e, "answer generation failed");
            e.in_stage("generate", question)
        })
    }
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_provider", &self.embedding_provider.name())
            .field("reranker", &self.reranker.as_ref().map(|r| r.name().to_string()))
            .field("synthesizer", &self.synthesizer)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` is required. A pipeline without a `generator` can
/// ingest and retrieve but not answer. Without an explicit index an empty
/// [`InMemoryIndex`] of the provider's dimensionality is used; without a
/// config, [`RagConfig::default()`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    reranker: Option<Arc<dyn Reranker>>,
    generator: Option<Arc<dyn Generator>>,
    page_source: Option<Arc<dyn PageSource>>,
    template: Option<PromptTemplate>,
    system_instruction: Option<String>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Use an existing index, e.g. one loaded from disk.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set an optional reranker for the second retrieval stage.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Set the language model used for answers.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Read documents with a custom [`PageSource`] instead of the PDF reader.
    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.page_source = Some(source);
        self
    }

    /// Use a custom answer template.
    ///
    /// The template must use the `{question}` and `{context}` placeholders.
    pub fn prompt_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Replace the grounding system instruction.
    pub fn system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// config is invalid, [`RagError::Template`] if the template lacks a
    /// required placeholder, and [`RagError::DimensionMismatch`] if the
    /// index and provider disagree.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;

        let dimensions = embedding_provider.dimensions();
        let index = match self.index {
            Some(index) if index.dimensions() != dimensions => {
                return Err(RagError::DimensionMismatch {
                    expected: index.dimensions(),
                    actual: dimensions,
                });
            }
            Some(index) => index,
            None => Arc::new(InMemoryIndex::new(dimensions)),
        };

        if let Some(template) = &self.template {
            let names = template.placeholders();
            if !names.contains("question") || !names.contains("context") {
                return Err(RagError::Template(
                    "prompt template must use {question} and {context}".to_string(),
                ));
            }
        }

        let synthesizer = self.generator.map(|generator| {
            let mut synthesizer = AnswerSynthesizer::new(generator)
                .with_temperature(config.temperature)
                .with_deduplication(config.deduplicate_context);
            if let Some(template) = self.template {
                synthesizer = synthesizer.with_template(template);
            }
            if let Some(instruction) = self.system_instruction {
                synthesizer = synthesizer.with_system_instruction(instruction);
            }
            synthesizer
        });

        Ok(RagPipeline {
            config,
            embedding_provider,
            index,
            reranker: self.reranker,
            page_source: self.page_source,
            synthesizer,
        })
    }
}
