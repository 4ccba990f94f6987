//! Record path: CORRECT_TRANSCRIPTION → CORRECT_SCHEMA → VALIDATE_VOCAB → IMPUTE → DONE.
//!
//! There is no failure state. Model stages fail open and the pure stages
//! report what they could not use as warnings on the result.

use serde_json::Value;
use std::sync::Arc;

use super::extraction::RecordExtractor;
use super::schema::SchemaCorrector;
use super::transcription::TranscriptionCorrector;
use super::{imputation, vocab_validation, ValidationResult, ValidationWarning};
use crate::config::NormalizerConfig;
use crate::services::{CallPolicy, GenerationService, Guarded};

/// Free-text fields of a document that go through transcription correction.
const NARRATIVE_POINTERS: &[&str] = &[
    "/annotazioni",
    "/chiamata/condizione_riferita",
    "/provvedimenti/infusioni_farmaci",
];

pub struct RecordNormalizer {
    transcription: TranscriptionCorrector,
    schema: SchemaCorrector,
    extractor: RecordExtractor,
}

impl RecordNormalizer {
    pub fn new(llm: Arc<dyn GenerationService>, config: &NormalizerConfig, policy: CallPolicy) -> Self {
        let llm: Arc<dyn GenerationService> = Arc::new(Guarded::new(llm, policy));
        Self {
            transcription: TranscriptionCorrector::new(Arc::clone(&llm), config.transcription_params()),
            schema: SchemaCorrector::new(Arc::clone(&llm), config.schema_params()),
            extractor: RecordExtractor::new(llm, config.extraction_params()),
        }
    }

    /// Normalize an extracted document into a canonical record.
    pub async fn normalize(&self, document: &Value) -> ValidationResult {
        let mut document = document.clone();
        self.correct_narrative(&mut document).await;
        tracing::debug!(stage = "correct_transcription", "Record stage complete");

        let document = self.schema.correct(&document).await;
        tracing::debug!(stage = "correct_schema", "Record stage complete");

        finish(validate_and_impute(&document))
    }

    /// Build a canonical record straight from a dictated transcript.
    pub async fn author_from_transcript(&self, transcript: &str) -> ValidationResult {
        let corrected = self.transcription.correct(transcript).await;
        tracing::debug!(stage = "correct_transcription", "Record stage complete");

        let document = match self.extractor.extract(&corrected).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, "Record extraction failed, returning empty record");
                let mut result = validate_and_impute(&Value::Object(Default::default()));
                result
                    .warnings
                    .insert(0, ValidationWarning::new("$", format!("extraction failed: {}", e)));
                return finish(result);
            }
        };

        let document = self.schema.correct(&document).await;
        tracing::debug!(stage = "correct_schema", "Record stage complete");

        finish(validate_and_impute(&document))
    }

    async fn correct_narrative(&self, document: &mut Value) {
        for pointer in NARRATIVE_POINTERS {
            let Some(Value::String(text)) = document.pointer(pointer) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }

            let corrected = self.transcription.correct(text).await;
            if let Some(slot) = document.pointer_mut(pointer) {
                *slot = Value::String(corrected);
            }
        }
    }
}

/// The two deterministic stages: vocabulary validation, then imputation.
pub fn validate_and_impute(document: &Value) -> ValidationResult {
    let mut result = vocab_validation::validate_document(document);
    imputation::impute(&mut result.record, &mut result.warnings);
    result
}

fn finish(result: ValidationResult) -> ValidationResult {
    if result.warnings.is_empty() {
        tracing::info!("Record normalized");
    } else {
        tracing::warn!(warning_count = result.warnings.len(), "Record normalized with warnings");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ClinicalRecord, Coded};
    use crate::services::mock::MockGenerationService;
    use crate::services::RetryPolicy;
    use crate::vocabulary::{ExitCode, Sex};
    use serde_json::json;
    use std::time::Duration;

    fn policy() -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
        }
    }

    fn normalizer(llm: &Arc<MockGenerationService>) -> RecordNormalizer {
        RecordNormalizer::new(llm.clone(), &NormalizerConfig::default(), policy())
    }

    #[tokio::test]
    async fn test_offline_model_still_normalizes() {
        let llm = Arc::new(MockGenerationService::failing());
        let normalizer = normalizer(&llm);

        let result = normalizer
            .normalize(&json!({
                "annotazioni": "paziente trasportato in PS",
                "chiamata": {"codice_uscita": "giallo", "orari": {"h_arrivo_sul_posto": "10:00"}},
                "dati_paziente": {"sesso": "uomo"}
            }))
            .await;

        assert_eq!(result.record.annotazioni.as_deref(), Some("paziente trasportato in PS"));
        assert_eq!(result.record.chiamata.codice_uscita, Coded::Known(ExitCode::Yellow));
        assert_eq!(result.record.dati_paziente.sesso, Coded::Known(Sex::Male));
        assert_eq!(result.record.chiamata.orari.h_partenza_dal_posto.as_deref(), Some("10:30"));
        assert_eq!(result.record.episodio_numero, Some(1));
        // One transcription call per narrative field present, then schema correction
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let llm = Arc::new(MockGenerationService::new());
        llm.push_reply("Dolore toracico, SpO2 93%");
        llm.push_reply("{\"annotazioni\": \"Dolore toracico, SpO2 93%\", \"chiamata\": {\"codice_uscita\": \"rosso\"}}");
        let normalizer = normalizer(&llm);

        let result = normalizer
            .normalize(&json!({"annotazioni": "dolore torace spazio due 93", "codice": "rosso"}))
            .await;

        let prompts = llm.prompts();
        assert!(prompts[0].contains("spazio due 93"));
        assert!(prompts[1].contains("Dolore toracico, SpO2 93%"));
        assert!(prompts[1].contains("\"codice\": \"rosso\""));

        assert_eq!(result.record.annotazioni.as_deref(), Some("Dolore toracico, SpO2 93%"));
        assert_eq!(result.record.chiamata.codice_uscita, Coded::Known(ExitCode::Red));
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[tokio::test]
    async fn test_transcript_extraction_failure_yields_empty_record() {
        let llm = Arc::new(MockGenerationService::new());
        llm.push_reply("Paziente cosciente");
        llm.push_reply("non riesco a estrarre dati");
        let normalizer = normalizer(&llm);

        let result = normalizer.author_from_transcript("paziente cosciente").await;

        assert_eq!(result.warnings[0].field, "$");
        assert!(result.warnings[0].message.starts_with("extraction failed"));
        let mut expected = ClinicalRecord::default();
        imputation::impute(&mut expected, &mut Vec::new());
        assert_eq!(result.record, expected);
    }

    #[tokio::test]
    async fn test_transcript_to_record() {
        let llm = Arc::new(MockGenerationService::new());
        llm.push_reply("Donna di 60 anni, GCS 15");
        llm.push_reply("{\"dati_paziente\": {\"sesso\": \"Donna\"}, \"rilevazioni\": [{\"ora\": \"09:10\", \"gcs\": {\"totale\": 15}}]}");
        llm.push_reply("non valido");
        let normalizer = normalizer(&llm);

        let result = normalizer.author_from_transcript("donna sessanta anni gcs quindici").await;

        assert_eq!(llm.call_count(), 3);
        assert_eq!(result.record.dati_paziente.sesso, Coded::Known(Sex::Female));
        let gcs = &result.record.rilevazioni[0].gcs;
        assert_eq!((gcs.apertura_occhi, gcs.risposta_verbale, gcs.risposta_motoria), (Some(4), Some(5), Some(6)));
    }

    #[test]
    fn test_validate_and_impute_is_idempotent() {
        let first = validate_and_impute(&json!({
            "chiamata": {"codice_rientro": "urgente", "orari": {"h_arrivo_sul_posto": "22:50"}},
            "annotazioni": "trasportato in ospedale",
            "rilevazioni": [{"ora": "22:55", "gcs": {"totale": 9}}],
            "lesioni": [{"parte": "gamba sinistra", "tipo": "ferita"}]
        }));
        let second = validate_and_impute(&first.record.to_value());
        assert_eq!(first.record, second.record);
        assert!(second.warnings.is_empty(), "{:?}", second.warnings);
    }
}
