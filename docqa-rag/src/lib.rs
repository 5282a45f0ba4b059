//! # docqa-rag
//!
//! Retrieval-augmented question answering over a directory of PDFs.
//!
//! ## Overview
//!
//! The crate is a set of small capabilities composed by [`RagPipeline`]:
//!
//! - [`DocumentExtractor`] - PDF pages and tables to bounded text chunks
//! - [`EmbeddingProvider`] - text to fixed-size vectors ([`HashingEmbedder`] offline)
//! - [`VectorIndex`] - exact cosine search ([`InMemoryIndex`])
//! - [`Reranker`] - optional second stage ([`LexicalReranker`], [`NoOpReranker`])
//! - [`Generator`] - the language model behind [`AnswerSynthesizer`]
//!
//! Remote capabilities can be wrapped in [`Retrying`] to retry transient
//! failures without changing the pipeline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{HashingEmbedder, MockGenerator, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::builder().chunk_size(500).chunk_overlap(50).build()?)
//!     .embedding_provider(Arc::new(HashingEmbedder::default()))
//!     .generator(Arc::new(MockGenerator::fixed("...")))
//!     .build()?;
//!
//! pipeline.ingest_directory("./pdfs").await?;
//! let answer = pipeline.answer("What festival does Cannes host?").await?;
//! println!("{}", answer.answer);
//! ```
//!
//! ## Features
//!
//! - `openai` - OpenAI-compatible embeddings and chat completions
//! - `remote-rerank` - hosted `/rerank` endpoints (Cohere, Jina, TEI)

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
#[cfg(feature = "remote-rerank")]
pub mod remote_rerank;
pub mod reranker;
pub mod retry;
pub mod synthesis;

pub use chunking::RecursiveSplitter;
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, ChunkKind, ChunkVector, RagAnswer, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{DocumentExtractor, ExtractionStats, PageContent, PageSource, PdfReader};
pub use generation::{GenerationRequest, Generator};
pub use hashing::HashingEmbedder;
pub use index::{InMemoryIndex, VectorIndex};
pub use mock::MockGenerator;
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::PromptTemplate;
#[cfg(feature = "remote-rerank")]
pub use remote_rerank::ApiReranker;
pub use reranker::{LexicalReranker, NoOpReranker, Reranker};
pub use retry::{RetryPolicy, Retrying};
pub use synthesis::{AnswerSynthesizer, build_context};
