//! Stage 1: speech-to-text error correction.

use std::sync::Arc;

use crate::llm_json::{strip_code_fences, strip_wrapping_quotes};
use crate::services::{GenerationParams, GenerationService};

pub struct TranscriptionCorrector {
    llm: Arc<dyn GenerationService>,
    params: GenerationParams,
}

impl TranscriptionCorrector {
    pub fn new(llm: Arc<dyn GenerationService>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    /// Corrected text, or `text` unchanged when the model fails or answers with nothing.
    pub async fn correct(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        match self.llm.generate(&correction_prompt(text), &self.params).await {
            Ok(reply) => {
                let corrected = strip_wrapping_quotes(strip_code_fences(&reply));
                if corrected.is_empty() {
                    tracing::warn!("Transcription correction returned empty text, keeping input");
                    return text.to_string();
                }
                tracing::debug!(
                    input_chars = text.len(),
                    output_chars = corrected.len(),
                    "Transcription corrected"
                );
                corrected.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transcription correction failed, keeping input");
                text.to_string()
            }
        }
    }
}

pub fn correction_prompt(text: &str) -> String {
    format!(
        r#"Sei un assistente esperto in medicina d'emergenza e trascrizioni audio.
Il seguente testo proviene dalla trascrizione automatica di un audio registrato durante un intervento di soccorso.

La trascrizione potrebbe contenere errori dovuti a:
- Rumore di fondo (sirene, radio, ambiente ospedaliero)
- Termini medici pronunciati velocemente
- Nomi di farmaci o procedure mediche
- Codici e sigle sanitarie
- Orari e date pronunciati rapidamente

COMPITO:
Correggi SOLO gli errori evidenti di trascrizione mantenendo il significato originale.
NON aggiungere informazioni non presenti nel testo originale.
NON modificare quantità, dosaggi o durate.

ESEMPI DI CORREZIONI TIPICHE:
- "spazio due" → "SpO2"
- "frequenza cardiaca bpm" → "FC bpm"
- "pressione arteriosa" → "PA"
- "glasgow coma scale" → "GCS"
- "via venosa" → "accesso venoso"
- "collare server calle" → "collare cervicale"

Restituisci SOLO il testo corretto, senza commenti aggiuntivi.

Testo da correggere:
"""{}""""#,
        text
    )
}
