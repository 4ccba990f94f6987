//! Free-text transcript to a first-draft record document.

use serde_json::Value;
use std::sync::Arc;

use super::schema::REFERENCE_SCHEMA;
use crate::error::SampleError;
use crate::llm_json::extract_json_object;
use crate::services::{GenerationParams, GenerationService};

const FIELD_RULES: &str = "\
- Sesso: usa \"M\" per maschio, \"F\" per femmina
- Coscienza: usa codici A (sveglio), V (voce), P (dolore), U (incosciente)
- Cute: usa \"normale\", \"pallida\", \"cianotica\", \"sudata\"
- Respiro: usa \"normale\", \"tachipnoico\", \"bradipnoico\", \"assente\"
- Pupille: usa \"piccola\", \"media\", \"grande\"
- Codici uscita: B (bianco), V (verde), G (giallo), R (rosso)
- Codici rientro: 0 (non necessario), 1 (non trasportato), 2 (non urgente), 3 (urgente), 4 (critico)
- Lesioni parti: usa \"Testa\", \"Collo\", \"Braccio Sx/Dx\", \"Avambraccio Sx/Dx\", \"Mano Sx/Dx\", \"Torace\", \"Addome\", \"Schiena\", \"Pelvi\", \"Coscia Sx/Dx\", \"Gamba Sx/Dx\", \"Piede Sx/Dx\", \"Caviglia Sx/Dx\"
- Lesioni tipi: usa codici 1=Amputazione, 2=Deformità, 3=Dolore, 4=Emorragia, 5=Ferita profonda, 6=Ferita superficiale, 7=Trauma chiuso, 8=Ustione, 9=Deficit motorio, A=Sensibilità assente, B=Frattura/sosp., C=Lussazione/sosp.
- id: lascia sempre vuoto \"\"
- Valori vuoti: usa \"\" per stringhe vuote, mai null
- Array vuoti: se non ci sono lesioni, usa array vuoto []
- Valori numerici: usa null solo per misurazioni non effettuate";

pub struct RecordExtractor {
    llm: Arc<dyn GenerationService>,
    params: GenerationParams,
}

impl RecordExtractor {
    pub fn new(llm: Arc<dyn GenerationService>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    /// One extraction call; the reply must contain a single JSON object.
    pub async fn extract(&self, transcript: &str) -> Result<Value, SampleError> {
        let reply = self.llm.generate(&extraction_prompt(transcript), &self.params).await?;
        let document = extract_json_object(&reply)?;
        tracing::debug!(fields = document.len(), "Record extracted from transcript");
        Ok(Value::Object(document))
    }
}

pub fn extraction_prompt(transcript: &str) -> String {
    format!(
        "Sei un assistente esperto in medicina d'emergenza.\n\
         Dal testo clinico che segue, estrai i dati e restituisci un oggetto JSON valido.\n\n\
         REGOLE IMPORTANTI:\n{}\n\n\
         Restituisci SOLO l'oggetto JSON, senza altri commenti.\n\n\
         Esempio di output:\n{}\n\n\
         Testo clinico:\n\"\"\"{}\"\"\"",
        FIELD_RULES, REFERENCE_SCHEMA, transcript
    )
}
