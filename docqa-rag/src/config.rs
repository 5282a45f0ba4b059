//! Configuration for the RAG pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
///
/// Retrieval runs in two stages: a broad vector search for
/// `num_retrieved_docs` candidates, then a rerank (or plain truncation)
/// down to `num_docs_final` passages that reach the prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of candidates fetched from the index per question.
    pub num_retrieved_docs: usize,
    /// Number of passages kept after reranking or truncation.
    pub num_docs_final: usize,
    /// Number of chunk texts sent to the embedding provider per call.
    pub embed_batch_size: usize,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Drop exact-duplicate passages before building the prompt context.
    pub deduplicate_context: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            num_retrieved_docs: 30,
            num_docs_final: 7,
            embed_batch_size: 32,
            temperature: 0.0,
            deduplicate_context: false,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    ///
    /// Fields missing from the file keep their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let config: RagConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `num_docs_final == 0`
    /// - `num_retrieved_docs < num_docs_final`
    /// - `embed_batch_size == 0`
    /// - `temperature` is negative or not finite
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.num_docs_final == 0 {
            return Err(RagError::Config("num_docs_final must be greater than zero".to_string()));
        }
        if self.num_retrieved_docs < self.num_docs_final {
            return Err(RagError::Config(format!(
                "num_retrieved_docs ({}) must be at least num_docs_final ({})",
                self.num_retrieved_docs, self.num_docs_final
            )));
        }
        if self.embed_batch_size == 0 {
            return Err(RagError::Config("embed_batch_size must be greater than zero".to_string()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(RagError::Config(format!(
                "temperature ({}) must be a non-negative number",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of first-stage candidates fetched from the index.
    pub fn num_retrieved_docs(mut self, k: usize) -> Self {
        self.config.num_retrieved_docs = k;
        self
    }

    /// Set the number of passages handed to the language model.
    pub fn num_docs_final(mut self, k: usize) -> Self {
        self.config.num_docs_final = k;
        self
    }

    /// Set the embedding batch size.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Drop exact-duplicate passages from the prompt context.
    pub fn deduplicate_context(mut self, enabled: bool) -> Self {
        self.config.deduplicate_context = enabled;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
