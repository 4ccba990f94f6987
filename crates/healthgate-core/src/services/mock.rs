//! In-memory service doubles for tests and for embedding applications that
//! run without network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{GenerationParams, GenerationService, RelevanceScorer, SearchHit, SimilaritySearch};
use crate::error::ServiceError;

type Responder = Box<dyn Fn(&str) -> Result<String, ServiceError> + Send + Sync>;

/// Generation service replaying scripted replies in order.
///
/// When the script runs out, the optional responder is consulted; without one
/// the call fails as unavailable.
#[derive(Default)]
pub struct MockGenerationService {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<(String, GenerationParams)>>,
    delay: Option<Duration>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock answering every prompt with `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::new().with_responder(move |_| Ok(reply.clone()))
    }

    /// Mock failing every call.
    pub fn failing() -> Self {
        Self::new().with_responder(|_| Err(ServiceError::Unavailable("mock offline".into())))
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: ServiceError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn params(&self) -> Vec<GenerationParams> {
        self.calls.lock().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError> {
        self.calls.lock().push((prompt.to_string(), *params));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => match &self.responder {
                Some(responder) => responder(prompt),
                None => Err(ServiceError::Unavailable("no scripted reply left".into())),
            },
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Similarity search over a fixed corpus, returning hits in insertion order.
#[derive(Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    fail: bool,
    calls: AtomicUsize,
    requested_k: Mutex<Vec<usize>>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Corpus built from `(content, source)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(content, source)| SearchHit {
                    content: content.to_string(),
                    source: source.to_string(),
                })
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_k(&self) -> Vec<usize> {
        self.requested_k.lock().clone()
    }
}

#[async_trait]
impl SimilaritySearch for StaticSearch {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_k.lock().push(k);
        if self.fail {
            return Err(ServiceError::Unavailable("search index offline".into()));
        }
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

/// Relevance scorer with per-candidate scores and a default for the rest.
pub struct TableScorer {
    default: f32,
    scores: HashMap<String, f32>,
    failures: Vec<String>,
    outage_calls: usize,
    calls: AtomicUsize,
}

impl TableScorer {
    pub fn new(default: f32) -> Self {
        Self {
            default,
            scores: HashMap::new(),
            failures: Vec::new(),
            outage_calls: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_score(mut self, candidate: impl Into<String>, score: f32) -> Self {
        self.scores.insert(candidate.into(), score);
        self
    }

    /// Scoring `candidate` fails.
    pub fn failing_for(mut self, candidate: impl Into<String>) -> Self {
        self.failures.push(candidate.into());
        self
    }

    /// The first `calls` scoring calls fail, whatever the candidate.
    pub fn with_outage(mut self, calls: usize) -> Self {
        self.outage_calls = calls;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceScorer for TableScorer {
    async fn score(&self, _query: &str, candidate: &str) -> Result<f32, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.outage_calls {
            return Err(ServiceError::Unavailable("scorer restarting".into()));
        }
        if self.failures.iter().any(|f| f == candidate) {
            return Err(ServiceError::Status {
                status: 500,
                body: "scorer crashed".into(),
            });
        }
        Ok(self.scores.get(candidate).copied().unwrap_or(self.default))
    }
}
