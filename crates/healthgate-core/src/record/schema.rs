//! Stage 2: reshape an extracted document to the canonical field layout.

use serde_json::Value;
use std::sync::Arc;

use crate::llm_json::extract_json_object;
use crate::services::{GenerationParams, GenerationService};

/// Filled-in example of the canonical record, shown to the model as the target layout.
pub const REFERENCE_SCHEMA: &str = r#"{
  "codice_fiscale": "",
  "id": "",
  "episodio_numero": 1,
  "is_ricorrente": false,
  "condizioni_croniche": [],
  "chiamata": {
    "data": "2018-04-02",
    "orari": {
      "h_chiamata": "12:32",
      "h_partenza": "12:35",
      "h_arrivo_sul_posto": "12:44",
      "h_partenza_dal_posto": "13:02",
      "h_arrivo_ps": "13:15",
      "h_libero_operativo": "13:26",
      "data_arrivo_ps": ""
    },
    "luogo_intervento": "Contrada Ughi, 28, 67032, Pescasseroli (AQ)",
    "condizione_riferita": "Malore sul lavoro",
    "recapito_telefonico": "353353104",
    "codice_uscita": "R",
    "codice_rientro": "3"
  },
  "ambulanza": {
    "sigla": {"CRI": "CRI-37", "Sel": "4893"},
    "equipaggio": {
      "autista": "Armani Serena",
      "soccorritore_1": "Finazzi Fulvio",
      "soccorritore_2": "Benassi Giorgia",
      "soccorritore_3": "",
      "infermiere": "Drago Orlando",
      "medico": "Costanzo Omar"
    }
  },
  "autorita_presenti": {
    "carabinieri": true,
    "polizia_stradale": false,
    "polizia_municipale": false,
    "vigili_del_fuoco": true,
    "guardia_medica": false,
    "altra_ambulanza": false,
    "automedica": false,
    "elisoccorso": false,
    "altro_descrizione": ""
  },
  "dati_paziente": {
    "cognome_nome": "Campana Vilma",
    "sesso": "F",
    "data_nascita": "1960-12-28",
    "luogo_nascita": "Andriano",
    "provincia_nascita": "VT",
    "residenza": {
      "citta": "Selvatelle",
      "provincia": "VT",
      "via": "Piazza Saracino",
      "numero_civico": "121"
    },
    "telefono": "353353104",
    "fonte_dati": "documento",
    "fonte_dati_altro": ""
  },
  "rilevazioni": [
    {
      "tempo": "T1",
      "ora": "12:32",
      "coscienza": "V",
      "cute": "cianotica",
      "respiro": "assente",
      "spo2_percent": 93,
      "fc_bpm": 66,
      "pa_mmhg": "171/116",
      "glicemia_mg_dl": 103,
      "temperatura_c": 36.3,
      "gcs": {
        "apertura_occhi": 2,
        "risposta_verbale": 4,
        "risposta_motoria": 1,
        "totale": 7
      }
    }
  ],
  "pupille": {
    "reagenti": true,
    "dx": "piccola",
    "sx": "grande"
  },
  "lesioni": [
    {"parte": "Caviglia Dx", "tipo": "B"}
  ],
  "trasporto_non_effettuato": {
    "causa": "non_necessita",
    "decesso": {
      "selezionato": false,
      "ora_decesso": "",
      "firma_medico": ""
    },
    "rifiuto": {
      "selezionato": true,
      "firma_interessato": "Filippi Monica"
    }
  },
  "provvedimenti": {
    "respiro": {
      "aspirazione": false,
      "cannula_orofaringea": false,
      "monitor_spo2": true,
      "ossigeno_l_min": null,
      "ventilazione": true,
      "intubazione_num": null
    },
    "circolo": {
      "emostasi": true,
      "accesso_venoso": true,
      "monitor_ecg": true,
      "monitor_nibp": true,
      "mce_min": null,
      "dae_num_shock": null
    },
    "immobilizzazione": {
      "collare_cervicale": false,
      "ked": false,
      "barella_cucchiaio": true,
      "tavola_spinale": false,
      "steccobenda": false,
      "materassino_depressione": false
    },
    "altro": {
      "coperta_isotermica": true,
      "medicazione": true,
      "ghiaccio": false,
      "osservazione": false,
      "custom_1": "",
      "custom_2": ""
    },
    "infusioni_farmaci": ""
  },
  "annotazioni": ""
}"#;

/// Key a model may return instead of a document when it cannot comply.
const ERROR_MARKER: &str = "error";

pub struct SchemaCorrector {
    llm: Arc<dyn GenerationService>,
    params: GenerationParams,
}

impl SchemaCorrector {
    pub fn new(llm: Arc<dyn GenerationService>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    /// Reshaped document, or `document` unchanged when the model's answer is unusable.
    pub async fn correct(&self, document: &Value) -> Value {
        let rendered = match serde_json::to_string_pretty(document) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(error = %e, "Could not render document for schema correction");
                return document.clone();
            }
        };

        let reply = match self.llm.generate(&schema_prompt(&rendered), &self.params).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Schema correction failed, keeping document");
                return document.clone();
            }
        };

        match extract_json_object(&reply) {
            Ok(corrected) if corrected.contains_key(ERROR_MARKER) => {
                tracing::warn!(
                    marker = %corrected[ERROR_MARKER],
                    "Schema correction reported an error, keeping document"
                );
                document.clone()
            }
            Ok(corrected) => {
                tracing::debug!(fields = corrected.len(), "Schema corrected");
                Value::Object(corrected)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Schema correction output unreadable, keeping document");
                document.clone()
            }
        }
    }
}

pub fn schema_prompt(document: &str) -> String {
    format!(
        "Sei un assistente per la correzione della struttura JSON.\n\
         Ricevi un JSON che contiene dati medici e devi correggerlo per farlo combaciare \
         PERFETTAMENTE con lo schema di riferimento fornito.\n\n\
         IMPORTANTE:\n\
         1. I nomi dei campi devono essere IDENTICI a quelli dello schema di riferimento\n\
         2. La struttura annidata deve essere IDENTICA\n\
         3. I tipi di dati devono essere mantenuti (string, number, boolean, array, object)\n\
         4. Mantieni TUTTI i valori originali, cambia solo i nomi dei campi se necessario\n\
         5. Se un campo non esiste nel JSON originale, aggiungilo con valore appropriato \
         (stringa vuota, null, false, array vuoto)\n\
         6. Il campo id deve rimanere vuoto se non presente nel JSON originale\n\n\
         Schema di riferimento (struttura):\n{}\n\n\
         JSON da correggere:\n{}\n\n\
         Restituisci SOLO il JSON corretto, senza altri commenti o spiegazioni.",
        REFERENCE_SCHEMA, document
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ClinicalRecord;
    use crate::services::mock::MockGenerationService;
    use serde_json::json;

    fn build(llm: MockGenerationService) -> (Arc<MockGenerationService>, SchemaCorrector) {
        let llm = Arc::new(llm);
        let corrector = SchemaCorrector::new(llm.clone(), GenerationParams::default());
        (llm, corrector)
    }

    #[test]
    fn test_reference_schema_matches_record_fields() {
        let schema: Value = serde_json::from_str(REFERENCE_SCHEMA).unwrap();
        let keys: Vec<&str> = schema.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys.len(), ClinicalRecord::FIELDS.len());
        for field in ClinicalRecord::FIELDS {
            assert!(keys.contains(field), "reference schema lacks {}", field);
        }

        // The example must read back losslessly through the typed record
        let record = ClinicalRecord::from_value(&schema);
        assert_eq!(record.rilevazioni[0].gcs.totale, Some(7));
        assert_eq!(record.ambulanza.sigla.cri.as_deref(), Some("CRI-37"));
    }

    #[tokio::test]
    async fn test_corrected_document_replaces_input() {
        let (llm, corrector) = build(MockGenerationService::always(
            "```json\n{\"dati_paziente\": {\"sesso\": \"M\"}}\n```",
        ));

        let corrected = corrector.correct(&json!({"paziente": {"sex": "M"}})).await;
        assert_eq!(corrected, json!({"dati_paziente": {"sesso": "M"}}));
        assert!(llm.prompts()[0].contains("\"sex\": \"M\""));
    }

    #[tokio::test]
    async fn test_unusable_answers_keep_input() {
        let input = json!({"annotazioni": "dolore toracico"});

        for reply in ["non posso", "[1, 2]", "{\"error\": \"schema non applicabile\"}"] {
            let (_, corrector) = build(MockGenerationService::always(reply));
            assert_eq!(corrector.correct(&input).await, input, "reply {:?}", reply);
        }

        let (_, corrector) = build(MockGenerationService::failing());
        assert_eq!(corrector.correct(&input).await, input);
    }
}
