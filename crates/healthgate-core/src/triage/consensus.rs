//! Aggregation of independent decision samples, biased toward care.
//!
//! | Samples                               | Decision          | Confidence |
//! |---------------------------------------|-------------------|------------|
//! | none                                  | consult clinician | 0.0        |
//! | all agree                             | the shared one    | 0.9        |
//! | disagree, >= 2 require care           | care required     | 0.6        |
//! | disagree otherwise                    | first sample's    | 0.5        |

use crate::config::ConsensusConfig;
use crate::types::{ConsensusDecision, Decision, DecisionCandidate};

pub const UNANIMOUS_CONFIDENCE: f32 = 0.9;
pub const CONSERVATIVE_MAJORITY_CONFIDENCE: f32 = 0.6;
pub const UNCERTAIN_CONFIDENCE: f32 = 0.5;

/// Care-required votes needed to override a split.
const CONSERVATIVE_VOTES: usize = 2;

pub struct ConsensusResolver {
    uncertainty_caveat: String,
    fallback_rationale: String,
    no_context_factor: f32,
}

impl ConsensusResolver {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            uncertainty_caveat: config.uncertainty_caveat.clone(),
            fallback_rationale: config.fallback_rationale.clone(),
            no_context_factor: config.no_context_factor,
        }
    }

    /// Decision emitted when no valid assessment exists.
    pub fn fallback(&self) -> ConsensusDecision {
        ConsensusDecision {
            decision: Decision::ConsultClinician,
            rationale: self.fallback_rationale.clone(),
            confidence: 0.0,
            red_flags: Vec::new(),
            severity: None,
            recommendations: None,
        }
    }

    /// Samples are treated as an unordered multiset except for "first
    /// sample" tie-breaking, which uses arrival order.
    pub fn resolve(&self, candidates: &[DecisionCandidate]) -> ConsensusDecision {
        let Some(first) = candidates.first() else {
            return self.fallback();
        };

        if candidates.iter().all(|c| c.decision == first.decision) {
            return ConsensusDecision::from_candidate(first, UNANIMOUS_CONFIDENCE);
        }

        let care_votes = candidates
            .iter()
            .filter(|c| c.decision == Decision::CareRequired)
            .count();

        if care_votes >= CONSERVATIVE_VOTES {
            if let Some(conservative) = candidates.iter().find(|c| c.decision == Decision::CareRequired) {
                return ConsensusDecision::from_candidate(conservative, CONSERVATIVE_MAJORITY_CONFIDENCE);
            }
        }

        let mut uncertain = ConsensusDecision::from_candidate(first, UNCERTAIN_CONFIDENCE);
        uncertain.rationale = format!("{} {}", uncertain.rationale.trim_end(), self.uncertainty_caveat);
        uncertain
    }

    /// Scale confidence down when no guideline backed the decision.
    pub fn downgrade_for_missing_context(&self, mut decision: ConsensusDecision) -> ConsensusDecision {
        decision.confidence = (decision.confidence * self.no_context_factor).clamp(0.0, 1.0);
        decision
    }
}

impl Default for ConsensusResolver {
    fn default() -> Self {
        Self::new(&ConsensusConfig::default())
    }
}
