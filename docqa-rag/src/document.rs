//! Data types for chunks, indexed vectors, search results, and answers.

use serde::{Deserialize, Serialize};

/// Where a chunk's text came from on its page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Running page text.
    Text,
    /// A table rendered as `" | "`-delimited rows.
    Table,
}

/// The smallest retrievable unit of source text.
///
/// Chunks are produced by the [`DocumentExtractor`](crate::extract::DocumentExtractor)
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `"{source_id}/{sequence_index}"`.
    pub id: String,
    /// The chunk text.
    pub text: String,
    /// Opaque identifier of the originating document page.
    pub source_id: String,
    /// 1-based page number within the source document.
    pub page: u32,
    /// Whether the text came from the page body or from a table.
    pub kind: ChunkKind,
    /// Position of this chunk among the chunks of the same source.
    pub sequence_index: usize,
}

impl Chunk {
    /// Create a chunk, deriving its id from the source and sequence index.
    pub fn new(
        text: impl Into<String>,
        source_id: impl Into<String>,
        page: u32,
        kind: ChunkKind,
        sequence_index: usize,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            id: format!("{source_id}/{sequence_index}"),
            text: text.into(),
            source_id,
            page,
            kind,
            sequence_index,
        }
    }
}

/// A [`Chunk`] paired with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkVector {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The vector embedding of the chunk text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The relevance score (higher is more relevant).
    pub score: f32,
}

/// A synthesized answer with the context it was generated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagAnswer {
    /// The trimmed model output.
    pub answer: String,
    /// The passages given to the model, in prompt order.
    pub context: Vec<String>,
}
