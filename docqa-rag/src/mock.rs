//! Scripted generator for tests and offline runs.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::generation::{GenerationRequest, Generator};

type Responder = Box<dyn Fn(&GenerationRequest) -> Result<String> + Send + Sync>;

/// A [`Generator`] whose replies come from a closure.
///
/// Every request is recorded and can be inspected with
/// [`requests`](MockGenerator::requests).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::MockGenerator;
///
/// let model = MockGenerator::fixed("Cannes hosts the Film Festival.");
/// ```
pub struct MockGenerator {
    name: String,
    responder: Responder,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockGenerator {
    /// Reply with the output of `responder` for each request.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self { name: "mock".to_string(), responder: Box::new(responder), requests: Mutex::default() }
    }

    /// Reply with the same text to every request.
    pub fn fixed(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Set the name reported by [`Generator::name`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(request.clone());
        (self.responder)(request)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MockGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerator").field("name", &self.name).finish_non_exhaustive()
    }
}
