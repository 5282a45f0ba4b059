//! Retry with exponential backoff for remote capabilities.
//!
//! [`Retrying`] wraps a [`Generator`] or [`EmbeddingProvider`] and repeats
//! calls that fail with a transient error (see
//! [`RagError::is_transient`](crate::RagError::is_transient)).
//! Every other error is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::generation::{GenerationRequest, Generator};

/// Backoff schedule for [`Retrying`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Factor applied to the delay after each retry.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Never exceeds `max_delay`. A delay that overflows or is not a valid
    /// duration, as a negative or NaN `multiplier` gives, becomes `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `operation`, retrying transient failures.
    pub async fn run<F, Fut, T>(&self, label: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Adapter adding a [`RetryPolicy`] to a remote capability.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{RetryPolicy, Retrying};
///
/// let model = Retrying::new(OpenAIChatModel::from_env()?, RetryPolicy::default());
/// ```
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> Retrying<T> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped capability.
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<G: Generator> Generator for Retrying<G> {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.policy.run("generate", || self.inner.generate(request)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for Retrying<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.policy.run("embed", || self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.policy.run("embed_batch", || self.inner.embed_batch(texts)).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
