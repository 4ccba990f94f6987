//! Triage path: BUILD_QUERY → RETRIEVE → GENERATE(×n) → RESOLVE → DONE.
//!
//! Only a request without symptoms fails. Every service failure degrades the
//! result (no guidelines, fewer samples, clinician fallback) instead.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::consensus::ConsensusResolver;
use super::generator::DecisionGenerator;
use crate::config::PipelineConfig;
use crate::error::TriageError;
use crate::rag::{query_builder, QueryExpander, RetrievalCache, RetrievalEngine};
use crate::services::{GenerationParams, GenerationService, Guarded, RelevanceScorer, SimilaritySearch};
use crate::types::{PatientContext, TriageMetadata, TriageOutcome, TriageRequest, TriageResponse, TriageStage};

pub struct TriageOrchestrator {
    retrieval: RetrievalEngine,
    generator: DecisionGenerator,
    resolver: ConsensusResolver,
    config: PipelineConfig,
}

impl TriageOrchestrator {
    /// Wire the pipeline. Every service is wrapped with the configured timeout and retry policy.
    pub fn new(
        llm: Arc<dyn GenerationService>,
        search: Arc<dyn SimilaritySearch>,
        scorer: Arc<dyn RelevanceScorer>,
        cache: Arc<RetrievalCache>,
        config: PipelineConfig,
    ) -> Self {
        let policy = config.services.call_policy();
        let llm: Arc<dyn GenerationService> = Arc::new(Guarded::new(llm, policy));
        let search: Arc<dyn SimilaritySearch> = Arc::new(Guarded::new(search, policy));
        let scorer: Arc<dyn RelevanceScorer> = Arc::new(Guarded::new(scorer, policy));

        let mut retrieval = RetrievalEngine::new(search, scorer, cache, &config.retrieval);
        if config.retrieval.query_expansion {
            let params = GenerationParams {
                temperature: config.retrieval.expansion_temperature,
                max_tokens: config.retrieval.expansion_max_tokens,
            };
            retrieval = retrieval.with_expander(QueryExpander::new(Arc::clone(&llm), params));
        }

        Self {
            retrieval,
            generator: DecisionGenerator::new(llm, &config.generation, config.consensus.labels.clone()),
            resolver: ConsensusResolver::new(&config.consensus),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full triage path for an upstream request.
    pub async fn triage(&self, request: &TriageRequest) -> Result<TriageOutcome, TriageError> {
        self.assess(&request.symptoms, &request.patient_context()).await
    }

    /// Run triage and render the downstream response object.
    pub async fn respond(&self, request: &TriageRequest) -> Result<TriageResponse, TriageError> {
        let outcome = self.triage(request).await?;
        Ok(outcome.decision.to_response(&self.config.consensus.labels))
    }

    pub async fn assess(&self, symptoms: &str, context: &PatientContext) -> Result<TriageOutcome, TriageError> {
        let request_id = Uuid::new_v4();
        let mut stages = vec![TriageStage::BuildQuery];

        if symptoms.trim().is_empty() {
            tracing::warn!(request_id = %request_id, "Triage request rejected: no symptoms");
            return Err(TriageError::MissingSymptoms);
        }

        let query = query_builder::build(symptoms, &context.prior_reports);
        tracing::debug!(
            request_id = %request_id,
            prior_reports = context.prior_reports.len(),
            "Triage query built"
        );

        stages.push(TriageStage::Retrieve);
        let retrieval = self
            .retrieval
            .retrieve_traced(
                &query.retrieval_text(),
                self.config.retrieval.k,
                self.config.retrieval.rerank_threshold,
            )
            .await;
        tracing::debug!(
            request_id = %request_id,
            excerpts = retrieval.excerpts.len(),
            cache_hit = retrieval.cache_hit,
            expanded = retrieval.query_expanded,
            "Guidelines retrieved"
        );
        if retrieval.excerpts.is_empty() {
            tracing::warn!(request_id = %request_id, "No guideline excerpt above threshold");
        }

        stages.push(TriageStage::Generate);
        let samples = self
            .generator
            .generate_samples(context, &retrieval.excerpts, &query.current_symptoms)
            .await;

        stages.push(TriageStage::Resolve);
        let mut decision = self.resolver.resolve(&samples.candidates);
        if retrieval.excerpts.is_empty() {
            decision = self.resolver.downgrade_for_missing_context(decision);
        }
        stages.push(TriageStage::Done);

        tracing::info!(
            request_id = %request_id,
            decision = ?decision.decision,
            confidence = decision.confidence,
            samples_answered = samples.candidates.len(),
            samples_requested = samples.requested,
            "Triage complete"
        );

        Ok(TriageOutcome {
            decision,
            metadata: TriageMetadata {
                request_id,
                completed_at: Utc::now(),
                excerpts_used: retrieval.excerpts.len(),
                samples_requested: samples.requested,
                samples_answered: samples.candidates.len(),
                query_expanded: retrieval.query_expanded,
                stages,
            },
            excerpts: retrieval.excerpts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{MockGenerationService, StaticSearch, TableScorer};
    use crate::types::Decision;
    use crate::vocabulary::Sex;

    const REQUIRED: &str = r#"{"decisione": "Pronto soccorso necessario", "motivazione": "sospetta SCA"}"#;
    const NOT_REQUIRED: &str = r#"{"decisione": "Pronto soccorso non necessario", "motivazione": "lieve"}"#;

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.retrieval.query_expansion = false;
        config.generation.concurrent_samples = false;
        config.services.retry.max_attempts = 1;
        config
    }

    fn request(symptoms: &str) -> TriageRequest {
        TriageRequest {
            symptoms: symptoms.into(),
            age: 58,
            sex: Sex::Male,
            reports: Vec::new(),
        }
    }

    fn guideline_search() -> Arc<StaticSearch> {
        Arc::new(StaticSearch::from_pairs(&[(
            "Dolore toracico acuto: invio in pronto soccorso",
            "triage.pdf",
        )]))
    }

    #[tokio::test]
    async fn test_missing_symptoms_fails() {
        let orchestrator = TriageOrchestrator::new(
            Arc::new(MockGenerationService::always(REQUIRED)),
            guideline_search(),
            Arc::new(TableScorer::new(0.9)),
            Arc::new(RetrievalCache::new()),
            config(),
        );
        let err = orchestrator.triage(&request("   ")).await.unwrap_err();
        assert_eq!(err, TriageError::MissingSymptoms);
    }

    #[tokio::test]
    async fn test_conservative_majority_end_to_end() {
        let llm = Arc::new(MockGenerationService::new());
        llm.push_reply(NOT_REQUIRED);
        llm.push_reply(REQUIRED);
        llm.push_reply(REQUIRED);

        let orchestrator = TriageOrchestrator::new(
            llm,
            guideline_search(),
            Arc::new(TableScorer::new(0.9)),
            Arc::new(RetrievalCache::new()),
            config(),
        );
        let outcome = orchestrator.triage(&request("dolore toracico")).await.unwrap();

        assert_eq!(outcome.decision.decision, Decision::CareRequired);
        assert_eq!(outcome.decision.confidence, 0.6);
        assert_eq!(outcome.metadata.excerpts_used, 1);
        assert_eq!(
            outcome.metadata.stages,
            vec![
                TriageStage::BuildQuery,
                TriageStage::Retrieve,
                TriageStage::Generate,
                TriageStage::Resolve,
                TriageStage::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_all_services_down_yields_fallback() {
        let orchestrator = TriageOrchestrator::new(
            Arc::new(MockGenerationService::failing()),
            Arc::new(StaticSearch::failing()),
            Arc::new(TableScorer::new(0.9)),
            Arc::new(RetrievalCache::new()),
            config(),
        );
        let response = orchestrator.respond(&request("dispnea")).await.unwrap();

        assert_eq!(response.decisione, "Consultare medico");
        assert_eq!(response.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_no_guidelines_downgrades_confidence() {
        let orchestrator = TriageOrchestrator::new(
            Arc::new(MockGenerationService::always(NOT_REQUIRED)),
            guideline_search(),
            Arc::new(TableScorer::new(0.2)),
            Arc::new(RetrievalCache::new()),
            config(),
        );
        let outcome = orchestrator.triage(&request("mal di gola")).await.unwrap();

        assert_eq!(outcome.decision.decision, Decision::CareNotRequired);
        assert!((outcome.decision.confidence - 0.45).abs() < 1e-6);
        assert_eq!(outcome.metadata.excerpts_used, 0);
        assert_eq!(outcome.metadata.samples_answered, 3);
    }

    #[tokio::test]
    async fn test_expansion_uses_shared_generation_service() {
        let llm = Arc::new(MockGenerationService::new().with_responder(|prompt| {
            if prompt.starts_with("Dato il termine medico") {
                Ok("angina, infarto, ischemia".into())
            } else {
                Ok(REQUIRED.into())
            }
        }));
        let mut config = config();
        config.retrieval.query_expansion = true;

        let orchestrator = TriageOrchestrator::new(
            llm.clone(),
            guideline_search(),
            Arc::new(TableScorer::new(0.9)),
            Arc::new(RetrievalCache::new()),
            config,
        );
        let outcome = orchestrator.triage(&request("dolore toracico")).await.unwrap();

        assert!(outcome.metadata.query_expanded);
        assert_eq!(llm.call_count(), 4);
        assert_eq!(outcome.decision.confidence, 0.9);
    }
}
