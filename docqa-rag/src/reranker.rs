//! Second-stage rerankers over a first-pass candidate set.
//!
//! Retrieval fetches a broad candidate list cheaply; a [`Reranker`] then
//! rescores that small set and keeps the best `top_k` for the prompt.

use std::collections::HashMap;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::document::SearchResult;
use crate::error::Result;

/// A reranker that re-scores, reorders, and truncates search results.
///
/// Implementations must return at most `top_k` results, each drawn from
/// `candidates`, ordered by the reranker's own score.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank `candidates` for `query`, keeping at most `top_k`.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "reranker"
    }
}

/// A reranker that keeps the first-pass order and truncates.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{NoOpReranker, Reranker};
///
/// let kept = NoOpReranker.rerank("query", results, 7).await?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        candidates.truncate(top_k);
        Ok(candidates)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// A BM25 reranker computed over the candidate set.
///
/// Document frequencies come from the candidates themselves, so terms that
/// appear in every candidate carry little weight. Common English function
/// words are dropped from both the query and the candidates before scoring;
/// over a set this small their IDF would otherwise outweigh the content
/// words. The returned scores are BM25 scores; ties keep first-pass order.
#[derive(Debug, Clone, Copy)]
pub struct LexicalReranker {
    k1: f32,
    b: f32,
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl LexicalReranker {
    /// Create a reranker with custom BM25 parameters.
    pub fn new(k1: f32, b: f32) -> Self {
        Self { k1, b }
    }

    fn score_all(&self, query: &str, candidates: &[SearchResult]) -> Vec<f32> {
        let docs: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.chunk.text)).collect();
        let n = docs.len() as f32;
        let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f32 / n.max(1.0);

        let mut query_terms = tokenize(query);
        query_terms.sort();
        query_terms.dedup();

        let doc_freq: HashMap<&str, f32> = query_terms
            .iter()
            .map(|term| {
                let df = docs.iter().filter(|doc| doc.contains(term)).count() as f32;
                (term.as_str(), df)
            })
            .collect();

        docs.iter()
            .map(|doc| {
                let len = doc.len() as f32;
                query_terms
                    .iter()
                    .map(|term| {
                        let tf = doc.iter().filter(|t| *t == term).count() as f32;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let df = doc_freq.get(term.as_str()).copied().unwrap_or(0.0);
                        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                        let norm = self.k1 * (1.0 - self.b + self.b * len / avg_len.max(1.0));
                        idf * tf * (self.k1 + 1.0) / (tf + norm)
                    })
                    .sum()
            })
            .collect()
    }
}

/// Words ignored when scoring.
const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "did", "do", "does", "for",
    "from", "has", "have", "how", "i", "in", "into", "is", "it", "its", "of", "on", "or", "than",
    "that", "the", "their", "there", "these", "this", "those", "to", "was", "were", "what", "when",
    "where", "which", "who", "whom", "why", "will", "with",
];

fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let scores = self.score_all(query, &candidates);
        let mut rescored: Vec<SearchResult> = candidates
            .into_iter()
            .zip(scores)
            .map(|(result, score)| SearchResult { chunk: result.chunk, score })
            .collect();

        rescored.sort_by(|a, b| b.score.total_cmp(&a.score));
        rescored.truncate(top_k);
        Ok(rescored)
    }

    fn name(&self) -> &str {
        "lexical"
    }
}
