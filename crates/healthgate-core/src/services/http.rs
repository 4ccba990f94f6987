//! HTTP adapters for the generation, similarity-search and relevance-scoring
//! services.
//!
//! Generation speaks either the Google `generateContent` API or any
//! OpenAI-compatible `/chat/completions` endpoint (OpenAI, Ollama, vLLM...).
//! Search and scoring use a small JSON contract:
//!
//! * `POST <search endpoint>` with `{"query": .., "k": ..}` answering either
//!   `[{"content": .., "source": ..}]` or `{"results": [...]}`
//! * `POST <score endpoint>` with `{"query": .., "candidate": ..}` answering
//!   `{"score": ..}`

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use super::{GenerationParams, GenerationService, RelevanceScorer, SearchHit, SimilaritySearch};
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    Google,
    OpenAiCompatible,
}

/// Connection settings shared by all HTTP adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServiceConfig {
    /// Base URL (generation) or full endpoint URL (search, scoring)
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Environment variable holding the API key, read when `api_key` is unset
    pub api_key_env: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash".into(),
            api_key: None,
            api_key_env: Some("GOOGLE_API_KEY".into()),
            connect_timeout_secs: 15,
            request_timeout_secs: 120,
        }
    }
}

impl HttpServiceConfig {
    fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty())
        })
    }

    fn build_client(&self) -> Result<Client, ServiceError> {
        Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ServiceError::Unavailable(format!("failed to build HTTP client: {}", e)))
    }
}

/// Send `body` to `url`, mapping transport failures and non-2xx answers.
async fn post_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    url: &str,
) -> Result<T, ServiceError> {
    let response = request.json(body).send().await.map_err(|e| {
        if e.is_timeout() {
            tracing::error!(endpoint = %url, "Request timed out");
        } else {
            tracing::error!(endpoint = %url, error = %e, "Request failed");
        }
        ServiceError::from(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(endpoint = %url, status = %status, error = %body, "Service returned error");
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    parse_json_response(response, url).await
}

/// Parse a response body as JSON, rejecting HTML error pages that some
/// proxies return with a 200 status.
async fn parse_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T, ServiceError> {
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::Unavailable(format!("failed to read body from {}: {}", url, e)))?;

    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(ServiceError::MalformedResponse(format!(
            "{} returned HTML instead of JSON: {}",
            url, preview
        )));
    }

    serde_json::from_str::<T>(&body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        ServiceError::MalformedResponse(format!("{}: {} (body: {})", url, e, preview))
    })
}

// ============================================================================
// Generation
// ============================================================================

pub struct HttpGenerationService {
    flavor: ApiFlavor,
    config: HttpServiceConfig,
    api_key: Option<String>,
    client: Client,
}

impl HttpGenerationService {
    pub fn new(flavor: ApiFlavor, config: HttpServiceConfig) -> Result<Self, ServiceError> {
        let client = config.build_client()?;
        let api_key = config.resolve_api_key();
        if api_key.is_none() && flavor == ApiFlavor::Google {
            tracing::warn!(model = %config.model, "No API key configured for Google generation");
        }

        tracing::info!(
            flavor = ?flavor,
            model = %config.model,
            endpoint = %config.endpoint,
            "Creating HTTP generation service"
        );

        Ok(Self {
            flavor,
            config,
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match self.flavor {
            ApiFlavor::Google => format!("{}/models/{}:generateContent", base, self.config.model),
            ApiFlavor::OpenAiCompatible => format!("{}/chat/completions", base),
        }
    }

    async fn google_generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError> {
        let url = self.endpoint();
        let body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_tokens,
            }
        });

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let result: GoogleResponse = post_json(request, &body, &url).await?;
        result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ServiceError::MalformedResponse("no candidates in Google response".into()))
    }

    async fn openai_generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError> {
        let url = self.endpoint();
        let body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "stream": false
        });

        let mut request = self.client.post(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let result: OpenAIResponse = post_json(request, &body, &url).await?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::MalformedResponse("no choices in completion response".into()))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ServiceError> {
        tracing::debug!(
            model = %self.config.model,
            max_tokens = params.max_tokens,
            prompt_len = prompt.len(),
            "Sending generation request"
        );
        match self.flavor {
            ApiFlavor::Google => self.google_generate(prompt, params).await,
            ApiFlavor::OpenAiCompatible => self.openai_generate(prompt, params).await,
        }
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Similarity search and scoring
// ============================================================================

pub struct HttpSimilaritySearch {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpSimilaritySearch {
    pub fn new(config: HttpServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: config.build_client()?,
            api_key: config.resolve_api_key(),
            url: config.endpoint,
        })
    }
}

#[async_trait]
impl SimilaritySearch for HttpSimilaritySearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        let mut request = self.client.post(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body = json!({"query": query, "k": k});
        let response: SearchResponse = post_json(request, &body, &self.url).await?;
        Ok(response.into_hits())
    }
}

pub struct HttpRelevanceScorer {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpRelevanceScorer {
    pub fn new(config: HttpServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: config.build_client()?,
            api_key: config.resolve_api_key(),
            url: config.endpoint,
        })
    }
}

#[async_trait]
impl RelevanceScorer for HttpRelevanceScorer {
    async fn score(&self, query: &str, candidate: &str) -> Result<f32, ServiceError> {
        let mut request = self.client.post(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body = json!({"query": query, "candidate": candidate});
        let response: ScoreResponse = post_json(request, &body, &self.url).await?;
        if !response.score.is_finite() {
            return Err(ServiceError::MalformedResponse(format!(
                "non-finite relevance score {}",
                response.score
            )));
        }
        Ok(response.score)
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Deserialize)]
struct GoogleContent {
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Bare(Vec<SearchHit>),
    Wrapped { results: Vec<SearchHit> },
}

impl SearchResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        match self {
            SearchResponse::Bare(hits) | SearchResponse::Wrapped { results: hits } => hits,
        }
    }
}

#[derive(Deserialize)]
struct ScoreResponse {
    score: f32,
}
