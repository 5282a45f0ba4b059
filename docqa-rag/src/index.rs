//! Knowledge index: chunk vectors with exact cosine-similarity search.
//!
//! [`InMemoryIndex`] keeps every [`ChunkVector`] in insertion order behind a
//! `tokio::sync::RwLock`, so concurrent searches share the read lock while
//! appends take the write lock.

use std::io::{BufWriter, Write};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{ChunkVector, SearchResult};
use crate::embedding::check_dimensions;
use crate::error::{RagError, Result};

/// A searchable store of chunk vectors sharing one dimensionality.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append vectors to the index.
    ///
    /// Either every vector is added or, on error, none is.
    async fn add(&self, vectors: Vec<ChunkVector>) -> Result<()>;

    /// Return up to `k` entries most similar to `query`, best first.
    ///
    /// Ties keep insertion order. If `k` exceeds the index size, every
    /// entry is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` has the wrong length.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Number of indexed vectors.
    async fn len(&self) -> usize;

    /// Whether the index holds no vectors.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Dimensionality every vector in the index must have.
    fn dimensions(&self) -> usize;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimensions: usize,
    entries: Vec<ChunkVector>,
}

/// An exact, in-memory [`VectorIndex`].
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::build(384, vectors)?;
/// let hits = index.search(&query_vector, 5).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryIndex {
    dimensions: usize,
    entries: RwLock<Vec<ChunkVector>>,
}

impl InMemoryIndex {
    /// Create an empty index for vectors of `dimensions` length.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, entries: RwLock::new(Vec::new()) }
    }

    /// Build an index from a complete set of vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has the wrong length.
    pub fn build(dimensions: usize, vectors: Vec<ChunkVector>) -> Result<Self> {
        for vector in &vectors {
            check_dimensions(dimensions, &vector.embedding)?;
        }
        Ok(Self { dimensions, entries: RwLock::new(vectors) })
    }

    /// Write the index to a JSON file.
    ///
    /// The file is written beside `path` and renamed over it, so an
    /// interrupted save leaves any previous index intact.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let entries = self.entries.read().await;
        let file = IndexFile { dimensions: self.dimensions, entries: entries.clone() };
        drop(entries);

        let temp = NamedTempFile::new_in(dir).map_err(|e| RagError::io(dir, e))?;
        let mut writer = BufWriter::new(temp);
        serde_json::to_writer(&mut writer, &file)?;
        writer.flush().map_err(|e| RagError::io(path, e))?;

        let temp = writer.into_inner().map_err(|e| RagError::io(path, e.into_error()))?;
        temp.as_file().sync_all().map_err(|e| RagError::io(path, e))?;
        temp.persist(path).map_err(|e| RagError::io(path, e.error))?;

        info!(path = %path.display(), chunk_count = file.entries.len(), "saved index");
        Ok(())
    }

    /// Read an index previously written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Fails if the file is unreadable, is not a valid index, or holds a
    /// vector of the wrong length.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| RagError::io(path, e))?;
        let file: IndexFile = serde_json::from_slice(&raw)
            .map_err(|e| RagError::Index(format!("invalid index file {}: {e}", path.display())))?;
        let index = Self::build(file.dimensions, file.entries)?;
        debug!(path = %path.display(), dimensions = index.dimensions, "loaded index");
        Ok(index)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, vectors: Vec<ChunkVector>) -> Result<()> {
        for vector in &vectors {
            check_dimensions(self.dimensions, &vector.embedding)?;
        }
        self.entries.write().await.extend(vectors);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        check_dimensions(self.dimensions, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<SearchResult> = entries
            .iter()
            .map(|entry| SearchResult {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, query),
            })
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
