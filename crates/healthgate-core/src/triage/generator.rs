//! Decision sampling: one generation call per sample, parsed into a candidate.

use futures::future::join_all;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::prompt::build_decision_prompt;
use crate::config::{DecisionLabels, GenerationConfig};
use crate::error::{ParseError, SampleError};
use crate::llm_json::extract_json_object;
use crate::services::{GenerationParams, GenerationService};
use crate::types::{Decision, DecisionCandidate, GuidelineExcerpt, PatientContext};

/// Valid candidates out of `requested` sample calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples {
    pub candidates: Vec<DecisionCandidate>,
    pub requested: usize,
}

pub struct DecisionGenerator {
    llm: Arc<dyn GenerationService>,
    labels: DecisionLabels,
    params: GenerationParams,
    sample_count: usize,
    concurrent: bool,
}

impl DecisionGenerator {
    pub fn new(llm: Arc<dyn GenerationService>, config: &GenerationConfig, labels: DecisionLabels) -> Self {
        Self {
            llm,
            labels,
            params: config.params(),
            sample_count: config.sample_count,
            concurrent: config.concurrent_samples,
        }
    }

    /// One independent sample.
    pub async fn generate(
        &self,
        context: &PatientContext,
        excerpts: &[GuidelineExcerpt],
        symptoms: &str,
    ) -> Result<DecisionCandidate, SampleError> {
        let prompt = build_decision_prompt(context, excerpts, symptoms, &self.labels);
        self.sample(&prompt).await
    }

    async fn sample(&self, prompt: &str) -> Result<DecisionCandidate, SampleError> {
        let output = self.llm.generate(prompt, &self.params).await?;
        Ok(parse_candidate(&output, &self.labels)?)
    }

    /// Issue every configured sample and keep the ones that parsed.
    pub async fn generate_samples(
        &self,
        context: &PatientContext,
        excerpts: &[GuidelineExcerpt],
        symptoms: &str,
    ) -> Samples {
        let prompt = build_decision_prompt(context, excerpts, symptoms, &self.labels);

        let results = if self.concurrent {
            join_all((0..self.sample_count).map(|_| self.sample(&prompt))).await
        } else {
            let mut results = Vec::with_capacity(self.sample_count);
            for _ in 0..self.sample_count {
                results.push(self.sample(&prompt).await);
            }
            results
        };

        let mut candidates = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => tracing::warn!(sample = index, error = %e, "Decision sample discarded"),
            }
        }

        tracing::debug!(
            requested = self.sample_count,
            answered = candidates.len(),
            "Decision sampling complete"
        );

        Samples {
            candidates,
            requested: self.sample_count,
        }
    }
}

/// Parse one model reply into a candidate.
pub fn parse_candidate(output: &str, labels: &DecisionLabels) -> Result<DecisionCandidate, ParseError> {
    let map = extract_json_object(output)?;

    let label = text_field(&map, &["decisione", "decision"]).ok_or(ParseError::MissingField("decisione"))?;
    let decision = parse_decision(&label, labels)?;
    let rationale =
        text_field(&map, &["motivazione", "rationale"]).ok_or(ParseError::MissingField("motivazione"))?;

    Ok(DecisionCandidate {
        decision,
        rationale,
        red_flags: red_flags(&map),
        severity: severity(&map),
        recommendations: text_field(&map, &["raccomandazioni", "recommendations"]),
    })
}

/// Exact label match first, then a keyword heuristic on the label text.
pub fn parse_decision(label: &str, labels: &DecisionLabels) -> Result<Decision, ParseError> {
    let normalized = normalize_label(label);

    if normalized == normalize_label(&labels.care_required) {
        return Ok(Decision::CareRequired);
    }
    if normalized == normalize_label(&labels.care_not_required) {
        return Ok(Decision::CareNotRequired);
    }

    let negated = normalized.contains("non necessari")
        || normalized.contains("non è necessari")
        || normalized.contains("not required")
        || normalized.contains("not necessary");
    if negated {
        return Ok(Decision::CareNotRequired);
    }
    if normalized.contains("necessari") || normalized.contains("required") {
        return Ok(Decision::CareRequired);
    }

    Err(ParseError::UnknownDecision(label.to_string()))
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn red_flags(map: &Map<String, Value>) -> Vec<String> {
    match map.get("red_flags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

fn severity(map: &Map<String, Value>) -> Option<u8> {
    let raw = match map.get("gravita").or_else(|| map.get("severity"))? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let rounded = raw.round();
    (1.0..=10.0).contains(&rounded).then_some(rounded as u8)
}
