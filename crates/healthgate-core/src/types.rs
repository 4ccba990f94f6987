use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DecisionLabels;
use crate::vocabulary::Sex;

/// Digest of one earlier clinical report for the same patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(rename = "data", alias = "date", default)]
    pub date: Option<String>,
    #[serde(rename = "sintomi", alias = "symptoms", default)]
    pub symptoms: Option<String>,
    #[serde(rename = "motivazione", alias = "rationale", default)]
    pub rationale: Option<String>,
    #[serde(rename = "diagnosi", alias = "diagnosis", default)]
    pub diagnosis: Option<String>,
    #[serde(rename = "trattamento", alias = "treatment", default)]
    pub treatment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    pub age: u32,
    pub sex: Sex,
    #[serde(default)]
    pub prior_reports: Vec<ReportSummary>,
}

/// Retrieval query for one triage request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomQuery {
    pub current_symptoms: String,
    pub history_digest: String,
}

impl SymptomQuery {
    /// Text sent to query expansion and similarity search.
    pub fn retrieval_text(&self) -> String {
        format!(
            "Sintomi attuali: {}\n{}",
            self.current_symptoms, self.history_digest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineExcerpt {
    pub content: String,
    pub source: String,
    /// Set by the reranker.
    pub relevance_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    CareRequired,
    CareNotRequired,
    /// Sentinel emitted when no valid assessment could be produced.
    ConsultClinician,
}

impl Decision {
    pub fn label<'a>(&self, labels: &'a DecisionLabels) -> &'a str {
        match self {
            Decision::CareRequired => &labels.care_required,
            Decision::CareNotRequired => &labels.care_not_required,
            Decision::ConsultClinician => &labels.consult_clinician,
        }
    }
}

/// One parsed generation sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionCandidate {
    pub decision: Decision,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<String>,
    /// 1 (minor) to 10 (life-threatening)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
}

impl DecisionCandidate {
    pub fn new(decision: Decision, rationale: impl Into<String>) -> Self {
        Self {
            decision,
            rationale: rationale.into(),
            red_flags: Vec::new(),
            severity: None,
            recommendations: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusDecision {
    pub decision: Decision,
    pub rationale: String,
    /// Sample agreement in [0, 1], not a calibrated probability.
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub red_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<String>,
}

impl ConsensusDecision {
    /// Adopt `candidate`'s decision, rationale and optional fields.
    pub fn from_candidate(candidate: &DecisionCandidate, confidence: f32) -> Self {
        Self {
            decision: candidate.decision,
            rationale: candidate.rationale.clone(),
            confidence,
            red_flags: candidate.red_flags.clone(),
            severity: candidate.severity,
            recommendations: candidate.recommendations.clone(),
        }
    }

    /// Wire representation with the configured labels.
    pub fn to_response(&self, labels: &DecisionLabels) -> TriageResponse {
        TriageResponse {
            decisione: self.decision.label(labels).to_string(),
            motivazione: self.rationale.clone(),
            confidence: self.confidence,
            red_flags: (!self.red_flags.is_empty()).then(|| self.red_flags.clone()),
            gravita: self.severity,
            raccomandazioni: self.recommendations.clone(),
        }
    }
}

/// Triage request as sent by the upstream aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    #[serde(rename = "sintomi", alias = "symptoms", default)]
    pub symptoms: String,
    pub age: u32,
    pub sex: Sex,
    #[serde(alias = "prior_reports", default)]
    pub reports: Vec<ReportSummary>,
}

impl TriageRequest {
    pub fn patient_context(&self) -> PatientContext {
        PatientContext {
            age: self.age,
            sex: self.sex,
            prior_reports: self.reports.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageStage {
    BuildQuery,
    Retrieve,
    Generate,
    Resolve,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageMetadata {
    pub request_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub excerpts_used: usize,
    pub samples_requested: usize,
    pub samples_answered: usize,
    pub query_expanded: bool,
    pub stages: Vec<TriageStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub decision: ConsensusDecision,
    pub excerpts: Vec<GuidelineExcerpt>,
    pub metadata: TriageMetadata,
}

/// Single JSON object returned downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResponse {
    pub decisione: String,
    pub motivazione: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravita: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raccomandazioni: Option<String>,
}
