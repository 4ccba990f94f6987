//! Interfaces to the black-box model services the pipeline consumes.
//!
//! Text generation, similarity search and pairwise relevance scoring are
//! provided by external systems. The pipeline only depends on these traits;
//! [`http`] holds network adapters, [`mock`] in-memory ones, and [`guard`] the
//! timeout/retry decorator the orchestrators wrap around every service.

pub mod guard;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub use guard::{CallPolicy, Guarded, RetryPolicy};

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1024,
        }
    }
}

/// One raw similarity-search result, before reranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    #[serde(default)]
    pub source: String,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError>;

    /// Short identifier used in logs and response metadata.
    fn name(&self) -> &str {
        "generation"
    }
}

#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ServiceError>;
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32, ServiceError>;
}
