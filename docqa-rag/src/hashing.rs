//! Offline feature-hashing embedder.
//!
//! [`HashingEmbedder`] maps each lowercased word to a signed bucket with
//! SHA-256 and L2-normalizes the resulting counts. It needs no model or
//! network access, so it backs tests and offline runs. Texts sharing words
//! score high cosine similarity; it captures no semantics beyond that.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Default number of hash buckets.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// A deterministic bag-of-words embedder using the hashing trick.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimensions` buckets.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Config("embedding dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions })
    }

    /// Embed synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in text.unicode_words() {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(head) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimensions: DEFAULT_DIMENSIONS }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embeddings_are_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Cannes hosts a film festival").await.unwrap();
        let b = embedder.embed("Cannes hosts a film festival").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_does_not_matter() {
        let embedder = HashingEmbedder::default();
        assert_eq!(embedder.embed_sync("Film Festival"), embedder.embed_sync("film festival"));
    }

    #[test]
    fn shared_words_score_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_sync("What festival does Cannes host?");
        let table = embedder.embed_sync("City | Feature\nCannes | Film Festival");
        let other = embedder.embed_sync("Nice is a coastal city.");
        assert!(dot(&query, &table) > dot(&query, &other));
    }

    #[test]
    fn empty_text_is_the_zero_vector() {
        let embedder = HashingEmbedder::new(8).unwrap();
        assert_eq!(embedder.embed_sync("  "), vec![0.0; 8]);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(HashingEmbedder::new(0), Err(RagError::Config(_))));
    }
}
