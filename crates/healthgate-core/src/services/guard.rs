//! Per-call timeout and bounded retry applied uniformly to every external
//! service the orchestrators call.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{GenerationParams, GenerationService, RelevanceScorer, SearchHit, SimilaritySearch};
use crate::error::ServiceError;

/// Bounded retry with doubling backoff capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl CallPolicy {
    /// Run `call` under the timeout, retrying retryable failures.
    ///
    /// A timed-out attempt counts as a failed attempt. Non-retryable errors
    /// are returned immediately.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut backoff = self.retry.initial_backoff;

        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        operation,
                        error = %e,
                        "Service call failed (attempt {}/{}), retrying in {:?}",
                        attempt,
                        attempts,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                }
                Err(e) => {
                    tracing::debug!(operation, attempt, error = %e, "Service call failed");
                    return Err(e);
                }
            }
        }

        // The loop always returns on its last attempt.
        Err(ServiceError::Unavailable(format!("{} made no attempt", operation)))
    }
}

/// Decorator applying a [`CallPolicy`] to a wrapped service.
pub struct Guarded<S: ?Sized> {
    inner: Arc<S>,
    policy: CallPolicy,
}

impl<S: ?Sized> Guarded<S> {
    pub fn new(inner: Arc<S>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: GenerationService + ?Sized> GenerationService for Guarded<S> {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError> {
        self.policy
            .run("generate", || self.inner.generate(prompt, params))
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl<S: SimilaritySearch + ?Sized> SimilaritySearch for Guarded<S> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        self.policy.run("search", || self.inner.search(query, k)).await
    }
}

#[async_trait]
impl<S: RelevanceScorer + ?Sized> RelevanceScorer for Guarded<S> {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32, ServiceError> {
        self.policy
            .run("score", || self.inner.score(query, candidate))
            .await
    }
}
