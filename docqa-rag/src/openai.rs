//! OpenAI-compatible embedding and chat clients.
//!
//! This module is only available when the `openai` feature is enabled.
//! Both clients accept a base URL, so they also work against any server
//! exposing the same `/embeddings` and `/chat/completions` routes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, Generator};

/// The default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

fn api_key_from_env(provider: &str) -> Result<String> {
    std::env::var("OPENAI_API_KEY").map_err(|_| RagError::Config(format!(
        "{provider}: OPENAI_API_KEY environment variable not set"
    )))
}

fn base_url_from_env() -> String {
    std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// Whether a failed HTTP status is worth retrying.
fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send a JSON POST and decode the JSON reply.
///
/// Connection failures, 429 and 5xx map to [`RagError::Transport`]; other
/// failures go through `fail`.
async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
    provider: &str,
    fail: impl Fn(String) -> RagError,
) -> Result<R> {
    let response = client.post(url).bearer_auth(api_key).json(body).send().await.map_err(|e| {
        error!(provider, error = %e, "request failed");
        RagError::Transport { provider: provider.to_string(), message: format!("request failed: {e}") }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        error!(provider, %status, "API error");
        let message = format!("API returned {status}: {detail}");
        if is_retryable(status) {
            return Err(RagError::Transport { provider: provider.to_string(), message });
        }
        return Err(fail(message));
    }

    response.json::<R>().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        fail(format!("failed to parse response: {e}"))
    })
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `api_key` – from the constructor or the `OPENAI_API_KEY` environment variable.
/// - `base_url` – defaults to `OPENAI_BASE_URL` or the public OpenAI endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a new provider from `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(api_key_from_env("OpenAI embeddings")?)?.with_base_url(base_url_from_env()))
    }

    /// Set the API base URL (without the `/embeddings` suffix).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    ///
    /// Call [`with_dimensions`](Self::with_dimensions) too if the model's
    /// native size differs from 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "OpenAI", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::Embedding {
            provider: "OpenAI".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = "OpenAI", batch_size = texts.len(), model = %self.model, "embedding batch");

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };
        let url = format!("{}/embeddings", self.base_url);
        let response: EmbeddingResponse =
            post_json(&self.client, &url, &self.api_key, &body, "OpenAI", |message| {
                RagError::Embedding { provider: "OpenAI".into(), message }
            })
            .await?;

        if response.data.len() != texts.len() {
            return Err(RagError::Embedding {
                provider: "OpenAI".into(),
                message: format!(
                    "API returned {} embeddings for {} inputs",
                    response.data.len(),
                    texts.len()
                ),
            });
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`Generator`] backed by an OpenAI-compatible `/chat/completions` API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIChatModel;
///
/// let model = OpenAIChatModel::from_env()?.with_model("gpt-4o");
/// ```
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatModel {
    /// Create a new chat model client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::Config("OpenAI API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_CHAT_MODEL.into(),
        })
    }

    /// Create a new client from `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(api_key_from_env("OpenAI chat")?)?.with_base_url(base_url_from_env()))
    }

    /// Set the API base URL (without the `/chat/completions` suffix).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Generator for OpenAIChatModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.prompt });

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(provider = "OpenAI", model = %self.model, prompt_len = request.prompt.len(), "chat completion");

        let url = format!("{}/chat/completions", self.base_url);
        let model = self.model.clone();
        let response: ChatResponse =
            post_json(&self.client, &url, &self.api_key, &body, "OpenAI", move |message| {
                RagError::Generation { model: model.clone(), message }
            })
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Generation {
                model: self.model.clone(),
                message: "API returned no message content".into(),
            })
    }

    fn name(&self) -> &str {
        &self.model
    }
}
