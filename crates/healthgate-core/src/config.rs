use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::services::guard::{CallPolicy, RetryPolicy};
use crate::services::GenerationParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub consensus: ConsensusConfig,
    pub services: ServiceConfig,
    pub normalizer: NormalizerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Excerpts kept after reranking
    pub k: usize,
    /// Excerpts scoring at or below this are discarded
    pub rerank_threshold: f32,
    /// Lower bound on the number of candidates fetched before reranking
    pub min_over_fetch: usize,
    pub query_expansion: bool,
    pub expansion_temperature: f32,
    pub expansion_max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub sample_count: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Issue the samples concurrently instead of one after another
    pub concurrent_samples: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub labels: DecisionLabels,
    /// Appended to the rationale when the samples disagree without a conservative majority
    pub uncertainty_caveat: String,
    pub fallback_rationale: String,
    /// Confidence multiplier applied when retrieval found no guideline excerpt
    pub no_context_factor: f32,
}

/// Wire labels for the three decision outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionLabels {
    pub care_required: String,
    pub care_not_required: String,
    pub consult_clinician: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub transcription_temperature: f32,
    pub transcription_max_tokens: u32,
    pub schema_temperature: f32,
    pub schema_max_tokens: u32,
    pub extraction_temperature: f32,
    pub extraction_max_tokens: u32,
}

impl PipelineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.retrieval.k == 0 {
            return Err("retrieval.k must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.retrieval.rerank_threshold) {
            return Err("retrieval.rerank_threshold must be in [0.0, 1.0]".into());
        }
        if self.generation.sample_count == 0 {
            return Err("generation.sample_count must be > 0".into());
        }
        if self.generation.max_tokens == 0 {
            return Err("generation.max_tokens must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err("generation.temperature must be in [0.0, 2.0]".into());
        }
        if !(0.0..=1.0).contains(&self.consensus.no_context_factor) {
            return Err("consensus.no_context_factor must be in [0.0, 1.0]".into());
        }
        let labels = &self.consensus.labels;
        if labels.care_required.trim().is_empty()
            || labels.care_not_required.trim().is_empty()
            || labels.consult_clinician.trim().is_empty()
        {
            return Err("consensus.labels must not be empty".into());
        }
        if labels.care_required.eq_ignore_ascii_case(&labels.care_not_required) {
            return Err("consensus.labels must be distinct".into());
        }
        if self.services.timeout_secs == 0 {
            return Err("services.timeout_secs must be > 0".into());
        }
        if self.services.retry.max_attempts == 0 {
            return Err("services.retry.max_attempts must be >= 1".into());
        }
        if self.services.retry.initial_backoff_ms > self.services.retry.max_backoff_ms {
            return Err("services.retry.initial_backoff_ms must be <= max_backoff_ms".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }
}

impl ServiceConfig {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            },
        }
    }
}

impl GenerationConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl NormalizerConfig {
    pub fn transcription_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.transcription_temperature,
            max_tokens: self.transcription_max_tokens,
        }
    }

    pub fn schema_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.schema_temperature,
            max_tokens: self.schema_max_tokens,
        }
    }

    pub fn extraction_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.extraction_temperature,
            max_tokens: self.extraction_max_tokens,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 6,
            rerank_threshold: 0.5,
            min_over_fetch: 12,
            query_expansion: true,
            expansion_temperature: 0.3,
            expansion_max_tokens: 64,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sample_count: 3,
            temperature: 0.1,
            max_tokens: 1024,
            concurrent_samples: true,
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            labels: DecisionLabels::default(),
            uncertainty_caveat: "(Valutazione con incertezza, si consiglia comunque consulto medico)"
                .into(),
            fallback_rationale: "Errore nella valutazione, consultare personale medico".into(),
            no_context_factor: 0.5,
        }
    }
}

impl Default for DecisionLabels {
    fn default() -> Self {
        Self {
            care_required: "Pronto soccorso necessario".into(),
            care_not_required: "Pronto soccorso non necessario".into(),
            consult_clinician: "Consultare medico".into(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 2_000,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            transcription_temperature: 0.2,
            transcription_max_tokens: 1024,
            schema_temperature: 0.1,
            schema_max_tokens: 2048,
            extraction_temperature: 0.1,
            extraction_max_tokens: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.k, 6);
        assert_eq!(config.generation.sample_count, 3);
        assert_eq!(config.consensus.labels.care_required, "Pronto soccorso necessario");
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"retrieval": {"k": 4}, "generation": {"sample_count": 5}}"#)
                .unwrap();
        assert_eq!(config.retrieval.k, 4);
        assert_eq!(config.retrieval.rerank_threshold, 0.5);
        assert_eq!(config.generation.sample_count, 5);
        assert_eq!(config.services.retry.max_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_broken_values() {
        let mut config = PipelineConfig::default();
        config.generation.sample_count = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.retrieval.rerank_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.consensus.labels.care_not_required = "pronto soccorso necessario".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_round_trip() {
        let path = std::env::temp_dir().join(format!("healthgate-config-{}.json", uuid::Uuid::new_v4()));
        let mut config = PipelineConfig::default();
        config.services.timeout_secs = 12;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.services.timeout_secs, 12);
        assert_eq!(loaded.services.call_policy().timeout, Duration::from_secs(12));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/healthgate.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
