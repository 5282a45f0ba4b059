//! Error types for the `docqa-eval` crate.

use std::path::PathBuf;

use docqa_rag::RagError;
use thiserror::Error;

/// Errors that can occur while generating or judging evaluation records.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A results or dataset file could not be read or written.
    #[error("I/O error ({path}): {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A results file is not a JSON array of records.
    #[error("Malformed results file ({path}): {source}")]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Judge output did not contain exactly one `[RESULT]` marker.
    #[error("Judge output for '{question}' has {markers} [RESULT] markers, expected 1: {output:?}")]
    JudgeFormat {
        /// The question being judged.
        question: String,
        /// How many markers were found.
        markers: usize,
        /// The raw judge output.
        output: String,
    },

    /// The pipeline failed to answer a dataset question.
    #[error("Answering '{question}' failed: {source}")]
    Answer {
        /// The question being answered.
        question: String,
        /// The pipeline error.
        #[source]
        source: RagError,
    },

    /// The judge model failed.
    #[error("Judging '{question}' failed: {source}")]
    Judge {
        /// The question being judged.
        question: String,
        /// The model error.
        #[source]
        source: RagError,
    },

    /// An evaluation dataset could not be parsed.
    #[error("Invalid dataset ({path}): {message}")]
    Dataset {
        /// The dataset file.
        path: PathBuf,
        /// A description of the problem.
        message: String,
    },
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Short name of the step that failed, used in run reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Answer { .. } => "answer",
            Self::Judge { .. } => "judge",
            Self::JudgeFormat { .. } => "parse",
            Self::Io { .. } | Self::Json { .. } | Self::Dataset { .. } => "storage",
        }
    }
}

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;
