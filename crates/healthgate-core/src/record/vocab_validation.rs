//! Controlled-vocabulary validation of extracted records.
//!
//! Reads the schema-corrected document into a typed record, then maps every
//! enumerable value that is not already canonical onto its code through the
//! vocabulary synonyms. Values nothing matches are cleared and reported; the
//! raw text survives only in the warning.

use serde_json::Value;

use super::{ClinicalRecord, Coded, ValidationResult, ValidationWarning};
use crate::vocabulary::Vocabulary;

/// Read `document` and normalize its enumerable fields.
pub fn validate_document(document: &Value) -> ValidationResult {
    let mut warnings = Vec::new();

    match document.as_object() {
        Some(object) => {
            for key in object.keys() {
                if !ClinicalRecord::FIELDS.contains(&key.as_str()) {
                    warnings.push(ValidationWarning::new(key.clone(), "unknown field dropped"));
                }
            }
        }
        None => warnings.push(ValidationWarning::new(
            "$",
            "document is not a JSON object, starting from an empty record",
        )),
    }

    let mut record = ClinicalRecord::from_value(document);
    validate_record(&mut record, &mut warnings);
    ValidationResult { record, warnings }
}

/// Normalize the enumerable fields of an already typed record.
pub fn validate_record(record: &mut ClinicalRecord, warnings: &mut Vec<ValidationWarning>) {
    resolve(&mut record.dati_paziente.sesso, "dati_paziente.sesso", warnings);
    resolve(&mut record.chiamata.codice_uscita, "chiamata.codice_uscita", warnings);
    resolve(&mut record.chiamata.codice_rientro, "chiamata.codice_rientro", warnings);

    for (i, reading) in record.rilevazioni.iter_mut().enumerate() {
        resolve(&mut reading.coscienza, &format!("rilevazioni[{}].coscienza", i), warnings);
        resolve(&mut reading.cute, &format!("rilevazioni[{}].cute", i), warnings);
        resolve(&mut reading.respiro, &format!("rilevazioni[{}].respiro", i), warnings);
    }

    resolve(&mut record.pupille.dx, "pupille.dx", warnings);
    resolve(&mut record.pupille.sx, "pupille.sx", warnings);

    let mut kept = Vec::with_capacity(record.lesioni.len());
    for (i, mut injury) in std::mem::take(&mut record.lesioni).into_iter().enumerate() {
        resolve(&mut injury.parte, &format!("lesioni[{}].parte", i), warnings);
        resolve(&mut injury.tipo, &format!("lesioni[{}].tipo", i), warnings);
        if injury.parte.is_empty() && injury.tipo.is_empty() {
            warnings.push(ValidationWarning::new(
                format!("lesioni[{}]", i),
                "injury with neither a recognized body part nor type dropped",
            ));
            continue;
        }
        kept.push(injury);
    }
    record.lesioni = kept;
}

/// Synonym resolution for one field; unmatched values are cleared and reported.
fn resolve<T: Vocabulary>(field: &mut Coded<T>, path: &str, warnings: &mut Vec<ValidationWarning>) {
    let Coded::Unmatched(raw) = field else {
        return;
    };

    match T::synonym_match(raw) {
        Some(member) => *field = Coded::Known(member),
        None => {
            warnings.push(ValidationWarning::new(
                path,
                format!("unrecognized value {:?} cleared", raw),
            ));
            *field = Coded::Empty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{BodyPart, Consciousness, ExitCode, InjuryType, PupilSize, ReturnCode, Sex, Skin};
    use serde_json::json;

    #[test]
    fn test_synonyms_become_codes() {
        let result = validate_document(&json!({
            "dati_paziente": {"sesso": "Donna"},
            "chiamata": {"codice_uscita": "rosso", "codice_rientro": "non urgente"},
            "rilevazioni": [{"ora": "10:00", "coscienza": "vigile", "cute": "pallida e sudata"}],
            "pupille": {"dx": "miotica", "sx": "media"},
            "lesioni": [{"parte": "avambraccio destro", "tipo": "frattura"}]
        }));
        let record = &result.record;

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(record.dati_paziente.sesso, Coded::Known(Sex::Female));
        assert_eq!(record.chiamata.codice_uscita, Coded::Known(ExitCode::Red));
        assert_eq!(record.chiamata.codice_rientro, Coded::Known(ReturnCode::NonUrgent));
        assert_eq!(record.rilevazioni[0].coscienza, Coded::Known(Consciousness::Alert));
        assert_eq!(record.rilevazioni[0].cute, Coded::Known(Skin::Pale));
        assert_eq!(record.pupille.dx, Coded::Known(PupilSize::Small));
        assert_eq!(record.pupille.sx, Coded::Known(PupilSize::Medium));
        assert_eq!(record.lesioni[0].parte, Coded::Known(BodyPart::RightForearm));
        assert_eq!(record.lesioni[0].tipo, Coded::Known(InjuryType::SuspectedFracture));
    }

    #[test]
    fn test_unmatched_values_are_cleared_with_warning() {
        let result = validate_document(&json!({
            "chiamata": {"codice_uscita": "arancione"},
            "rilevazioni": [{"ora": "10:00", "respiro": "strano"}]
        }));

        assert!(result.record.chiamata.codice_uscita.is_empty());
        assert!(result.record.rilevazioni[0].respiro.is_empty());
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].field, "chiamata.codice_uscita");
        assert!(result.warnings[0].message.contains("arancione"));
        assert_eq!(result.warnings[1].field, "rilevazioni[0].respiro");
    }

    #[test]
    fn test_injury_dropped_only_when_both_fields_unmatched() {
        let result = validate_document(&json!({
            "lesioni": [
                {"parte": "ginocchio", "tipo": "graffio"},
                {"parte": "testa", "tipo": "graffio"},
                {"parte": "", "tipo": ""}
            ]
        }));

        assert_eq!(result.record.lesioni.len(), 1);
        assert_eq!(result.record.lesioni[0].parte, Coded::Known(BodyPart::Head));
        assert!(result.record.lesioni[0].tipo.is_empty());
        assert!(result.warnings.iter().any(|w| w.field == "lesioni[0]"));
        assert!(result.warnings.iter().any(|w| w.field == "lesioni[2]"));
    }

    #[test]
    fn test_unknown_top_level_keys_are_reported() {
        let result = validate_document(&json!({"paziente": {"nome": "x"}, "annotazioni": "ok"}));
        assert_eq!(result.warnings, vec![ValidationWarning::new("paziente", "unknown field dropped")]);
        assert_eq!(result.record.annotazioni.as_deref(), Some("ok"));
    }

    #[test]
    fn test_non_object_document() {
        let result = validate_document(&json!("testo libero"));
        assert_eq!(result.record, ClinicalRecord::default());
        assert_eq!(result.warnings[0].field, "$");
    }
}
