//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// The same provider embeds chunks at index time and questions at query
/// time; vectors from different providers are never mixed in one index.
/// Implementations must be deterministic for a fixed configuration and
/// always return vectors of length [`dimensions`](EmbeddingProvider::dimensions).
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends with native
/// batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{EmbeddingProvider, HashingEmbedder};
///
/// let provider = HashingEmbedder::new(256)?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "embedder"
    }
}

/// Check that `vector` has `expected` dimensions.
pub(crate) fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(RagError::DimensionMismatch { expected, actual: vector.len() });
    }
    Ok(())
}
