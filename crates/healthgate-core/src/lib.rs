pub mod config;
pub mod error;
pub mod llm_json;
pub mod rag;
pub mod record;
pub mod services;
pub mod triage;
pub mod types;
pub mod vocabulary;

// Re-export primary types for convenience
pub use config::PipelineConfig;
pub use error::{ParseError, SampleError, ServiceError, TriageError};
pub use record::{ClinicalRecord, Coded, RecordNormalizer, ValidationResult, ValidationWarning};
pub use triage::TriageOrchestrator;
pub use types::{
    ConsensusDecision, Decision, DecisionCandidate, GuidelineExcerpt, PatientContext, ReportSummary,
    TriageOutcome, TriageRequest, TriageResponse,
};

// Re-export service seams
pub use services::{GenerationParams, GenerationService, RelevanceScorer, SearchHit, SimilaritySearch};

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
