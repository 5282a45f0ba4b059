//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source document could not be opened or parsed.
    #[error("Extraction error ({path}): {message}")]
    Extraction {
        /// The file that failed.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector did not match the dimensionality of the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// An error occurred in the knowledge index.
    #[error("Index error: {0}")]
    Index(String),

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    Reranker {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model returned an error or an unusable response.
    #[error("Generation error ({model}): {message}")]
    Generation {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A transient transport failure (network error, rate limit, 5xx).
    ///
    /// This is the only variant [`Retrying`](crate::retry::Retrying) retries.
    #[error("Transport error ({provider}): {message}")]
    Transport {
        /// The remote provider that was being called.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A prompt template could not be rendered.
    #[error("Template error: {0}")]
    Template(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline stage failed while handling a question.
    #[error("{stage} failed for question '{question}': {source}")]
    Pipeline {
        /// The stage that failed (`embed`, `search`, `rerank`, `generate`).
        stage: &'static str,
        /// The question being answered.
        question: String,
        /// The underlying error.
        #[source]
        source: Box<RagError>,
    },

    /// A filesystem operation failed.
    #[error("I/O error ({path}): {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RagError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Pipeline { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn in_stage(self, stage: &'static str, question: &str) -> Self {
        Self::Pipeline { stage, question: question.to_string(), source: Box::new(self) }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
