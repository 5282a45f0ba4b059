//! Hosted cross-encoder reranking.
//!
//! This module is only available when the `remote-rerank` feature is
//! enabled. [`ApiReranker`] posts the query and candidate texts to a
//! `/rerank` endpoint in the shape served by Cohere, Jina, and Hugging Face
//! text-embeddings-inference, and keeps the returned order.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;

#[derive(Serialize)]
struct RerankRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    relevance_score: f32,
}

/// A [`Reranker`] that delegates scoring to a hosted rerank endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::remote_rerank::ApiReranker;
///
/// let reranker = ApiReranker::new("https://api.cohere.com/v2")
///     .with_api_key(std::env::var("COHERE_API_KEY")?)
///     .with_model("rerank-v3.5");
/// ```
pub struct ApiReranker {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl ApiReranker {
    /// Create a reranker for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: None,
        }
    }

    /// Send a bearer token with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Name the rerank model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn failure(&self, message: String) -> RagError {
        RagError::Reranker { reranker: "api".into(), message }
    }
}

/// Map a service reply onto the candidates, rejecting out-of-range or
/// repeated indices.
fn apply_hits(
    candidates: Vec<SearchResult>,
    hits: Vec<RerankHit>,
    top_k: usize,
) -> std::result::Result<Vec<SearchResult>, String> {
    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut seen = HashSet::new();
    let mut ordered: Vec<(usize, f32)> = Vec::with_capacity(hits.len());

    for hit in hits {
        if hit.index >= slots.len() || !seen.insert(hit.index) {
            return Err(format!("service returned invalid candidate index {}", hit.index));
        }
        ordered.push((hit.index, hit.relevance_score));
    }
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(ordered
        .into_iter()
        .take(top_k)
        .filter_map(|(index, score)| {
            slots[index].take().map(|result| SearchResult { chunk: result.chunk, score })
        })
        .collect())
}

#[async_trait]
impl Reranker for ApiReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: self.model.as_deref(),
            query,
            documents: candidates.iter().map(|c| c.chunk.text.as_str()).collect(),
            top_n: top_k.min(candidates.len()),
        };

        debug!(reranker = "api", candidates = candidates.len(), top_k, "reranking");

        let mut request = self.client.post(format!("{}/rerank", self.base_url)).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(reranker = "api", error = %e, "request failed");
            RagError::Transport { provider: "rerank".into(), message: format!("request failed: {e}") }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(reranker = "api", %status, "API error");
            let message = format!("API returned {status}: {detail}");
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(RagError::Transport { provider: "rerank".into(), message });
            }
            return Err(self.failure(message));
        }

        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| self.failure(format!("failed to parse response: {e}")))?;

        apply_hits(candidates, parsed.results, top_k).map_err(|message| self.failure(message))
    }

    fn name(&self) -> &str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, ChunkKind};

    fn result(i: usize) -> SearchResult {
        SearchResult {
            chunk: Chunk::new(format!("text {i}"), "doc.pdf#page=1", 1, ChunkKind::Text, i),
            score: 0.5,
        }
    }

    fn hit(index: usize, relevance_score: f32) -> RerankHit {
        RerankHit { index, relevance_score }
    }

    #[test]
    fn hits_reorder_and_truncate() {
        let kept = apply_hits(
            vec![result(0), result(1), result(2)],
            vec![hit(0, 0.1), hit(2, 0.9), hit(1, 0.4)],
            2,
        )
        .unwrap();
        let order: Vec<usize> = kept.iter().map(|r| r.chunk.sequence_index).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn invalid_indices_are_rejected() {
        assert!(apply_hits(vec![result(0)], vec![hit(3, 1.0)], 1).is_err());
        assert!(apply_hits(vec![result(0), result(1)], vec![hit(0, 1.0), hit(0, 0.5)], 2).is_err());
    }
}
