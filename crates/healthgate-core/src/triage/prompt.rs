//! Prompt layout for triage decision samples.

use crate::config::DecisionLabels;
use crate::rag::query_builder::history_digest;
use crate::types::{GuidelineExcerpt, PatientContext};
use crate::vocabulary::Vocabulary;

pub const NO_GUIDELINES: &str =
    "Nessun estratto di linee guida pertinente è stato trovato: informazioni insufficienti, valuta con la massima prudenza.";

/// Guideline section, each excerpt tagged with its source.
pub fn format_excerpts(excerpts: &[GuidelineExcerpt]) -> String {
    if excerpts.is_empty() {
        return NO_GUIDELINES.to_string();
    }
    excerpts
        .iter()
        .map(|e| {
            let source = if e.source.trim().is_empty() { "sconosciuta" } else { e.source.trim() };
            format!("[Fonte: {}]\n{}", source, e.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_decision_prompt(
    context: &PatientContext,
    excerpts: &[GuidelineExcerpt],
    symptoms: &str,
    labels: &DecisionLabels,
) -> String {
    format!(
        r#"Sei un assistente sanitario che supporta il triage di pronto soccorso.
Devi stabilire se il paziente deve recarsi in pronto soccorso, basandoti sulle linee guida fornite.

ESEMPIO:
Sintomi: "Dolore toracico oppressivo irradiato al braccio sinistro, sudorazione profusa"
Età: 58, Sesso: M
Risposta:
{{"decisione": "{required}", "motivazione": "Quadro suggestivo di sindrome coronarica acuta, richiede valutazione immediata", "red_flags": ["dolore toracico tipico", "irradiazione", "sudorazione"], "gravita": 9}}

PAZIENTE:
Età: {age}
Sesso: {sex}
Sintomi attuali: {symptoms}

Storia clinica:
{history}

Linee guida pertinenti:
{guidelines}

ISTRUZIONI:
1. Identifica i sintomi di allarme (red flags).
2. Considera età, sesso e comorbidità dalla storia clinica.
3. In caso di dubbio scegli l'opzione più prudente.
4. Rispondi SOLO con un oggetto JSON con questi campi:
   "decisione": "{required}" oppure "{not_required}"
   "motivazione": spiegazione basata sulle linee guida
   facoltativi: "red_flags" (lista), "gravita" (1-10), "raccomandazioni" (testo)"#,
        required = labels.care_required,
        not_required = labels.care_not_required,
        age = context.age,
        sex = context.sex.code(),
        symptoms = symptoms.trim(),
        history = history_digest(&context.prior_reports),
        guidelines = format_excerpts(excerpts),
    )
}
