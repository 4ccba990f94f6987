//! Triage decision pipeline: prompt, sampling, consensus and orchestration.

pub mod consensus;
pub mod generator;
pub mod orchestrator;
pub mod prompt;

pub use consensus::ConsensusResolver;
pub use generator::{parse_candidate, DecisionGenerator, Samples};
pub use orchestrator::TriageOrchestrator;
