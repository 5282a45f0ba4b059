//! Language model capability used for answer synthesis and judging.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Optional system instruction.
    pub system: Option<String>,
    /// The user prompt.
    pub prompt: String,
    /// Sampling temperature; `0.0` for factual answers.
    pub temperature: f32,
    /// Upper bound on generated tokens, if the backend supports one.
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a request for `prompt` at temperature zero.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { system: None, prompt: prompt.into(), temperature: 0.0, max_tokens: None }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A text-generation backend.
///
/// Implementations return the raw model output. Network failures that may
/// succeed on retry should be reported as
/// [`RagError::Transport`](crate::RagError::Transport).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// The model name, used in logs and errors.
    fn name(&self) -> &str {
        "generator"
    }
}
