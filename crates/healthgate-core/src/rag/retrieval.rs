//! RetrievalEngine: guideline retrieval with reranking.
//!
//! query → optional expansion → cache lookup → over-fetching similarity
//! search → pairwise relevance scoring → threshold filter → top-k → cache.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{CacheKey, RetrievalCache};
use super::expansion::{ExpandedQuery, QueryExpander};
use crate::config::RetrievalConfig;
use crate::services::{RelevanceScorer, SimilaritySearch};
use crate::types::GuidelineExcerpt;

/// Ranked excerpts plus how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub excerpts: Vec<GuidelineExcerpt>,
    pub query_expanded: bool,
    pub cache_hit: bool,
}

impl Retrieval {
    fn empty(query_expanded: bool) -> Self {
        Self {
            excerpts: Vec::new(),
            query_expanded,
            cache_hit: false,
        }
    }
}

pub struct RetrievalEngine {
    search: Arc<dyn SimilaritySearch>,
    scorer: Arc<dyn RelevanceScorer>,
    expander: Option<QueryExpander>,
    cache: Arc<RetrievalCache>,
    min_over_fetch: usize,
}

impl RetrievalEngine {
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        scorer: Arc<dyn RelevanceScorer>,
        cache: Arc<RetrievalCache>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            search,
            scorer,
            expander: None,
            cache,
            min_over_fetch: config.min_over_fetch,
        }
    }

    /// Enable query expansion through `expander`.
    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    pub fn cache(&self) -> &Arc<RetrievalCache> {
        &self.cache
    }

    /// Ranked excerpts scoring strictly above `rerank_threshold`, at most `k`.
    pub async fn retrieve(&self, query: &str, k: usize, rerank_threshold: f32) -> Vec<GuidelineExcerpt> {
        self.retrieve_traced(query, k, rerank_threshold).await.excerpts
    }

    /// Same as [`retrieve`](Self::retrieve), also reporting expansion and cache use.
    ///
    /// Never fails: a failed search yields an empty result, which is not cached.
    pub async fn retrieve_traced(&self, query: &str, k: usize, rerank_threshold: f32) -> Retrieval {
        if k == 0 || query.trim().is_empty() {
            return Retrieval::empty(false);
        }

        let expanded = match &self.expander {
            Some(expander) => expander.expand(query).await,
            None => ExpandedQuery::unchanged(query),
        };

        let key = CacheKey::new(&expanded.text, k, rerank_threshold);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key.to_hex(), excerpts = cached.len(), "retrieval cache hit");
            return Retrieval {
                excerpts: cached.as_ref().clone(),
                query_expanded: expanded.expanded,
                cache_hit: true,
            };
        }

        let over_fetch = k.saturating_mul(2).max(self.min_over_fetch);
        let candidates = match self.search.search(&expanded.text, over_fetch).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "similarity search failed, continuing without guidelines");
                return Retrieval::empty(expanded.expanded);
            }
        };

        if candidates.is_empty() {
            debug!("no candidates found");
            return Retrieval::empty(expanded.expanded);
        }

        info!(candidates = candidates.len(), requested = over_fetch, "similarity search returned candidates");

        let scores = join_all(
            candidates
                .iter()
                .map(|hit| self.scorer.score(&expanded.text, &hit.content)),
        )
        .await;

        let mut scoring_failures = 0usize;
        let mut ranked: Vec<GuidelineExcerpt> = Vec::with_capacity(candidates.len());
        for (hit, score) in candidates.into_iter().zip(scores) {
            match score {
                Ok(score) if score.is_finite() && score > rerank_threshold => ranked.push(GuidelineExcerpt {
                    content: hit.content,
                    source: hit.source,
                    relevance_score: score,
                }),
                Ok(_) => {}
                Err(e) => {
                    warn!(source = %hit.source, error = %e, "relevance scoring failed, dropping candidate");
                    scoring_failures += 1;
                }
            }
        }

        ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        ranked.truncate(k);

        let mean_score = if ranked.is_empty() {
            0.0
        } else {
            ranked.iter().map(|e| e.relevance_score).sum::<f32>() / ranked.len() as f32
        };
        info!(
            excerpts = ranked.len(),
            mean_score,
            threshold = rerank_threshold,
            "reranking complete"
        );

        // A partial or empty ranking must not outlive a scorer outage.
        if scoring_failures > 0 || ranked.is_empty() {
            debug!(scoring_failures, excerpts = ranked.len(), "retrieval result not cached");
            return Retrieval {
                excerpts: ranked,
                query_expanded: expanded.expanded,
                cache_hit: false,
            };
        }

        let stored = self.cache.insert(key, ranked);
        Retrieval {
            excerpts: stored.as_ref().clone(),
            query_expanded: expanded.expanded,
            cache_hit: false,
        }
    }
}
