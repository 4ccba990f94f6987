//! Retrieval query composition from current symptoms and prior reports.

use crate::types::{ReportSummary, SymptomQuery};

/// Digest used when the patient has no prior report.
pub const NO_PRIOR_REPORTS: &str =
    "Non sono presenti report clinici precedenti associati a questo paziente";

const MISSING: &str = "N/A";

/// Build the query for one triage request.
///
/// Reports are flattened one per line in the order the caller supplied them.
pub fn build(symptoms: &str, prior_reports: &[ReportSummary]) -> SymptomQuery {
    SymptomQuery {
        current_symptoms: symptoms.trim().to_string(),
        history_digest: history_digest(prior_reports),
    }
}

pub fn history_digest(prior_reports: &[ReportSummary]) -> String {
    if prior_reports.is_empty() {
        return NO_PRIOR_REPORTS.to_string();
    }

    prior_reports
        .iter()
        .map(report_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn report_line(report: &ReportSummary) -> String {
    // Collapse line breaks so each report stays on its own line.
    let field = |value: &Option<String>| -> String {
        let collapsed = value
            .as_deref()
            .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        if collapsed.is_empty() {
            MISSING.to_string()
        } else {
            collapsed
        }
    };

    format!(
        "Report del {}: Sintomi: {} | Motivazione: {} | Diagnosi: {} | Trattamento: {}",
        field(&report.date),
        field(&report.symptoms),
        field(&report.rationale),
        field(&report.diagnosis),
        field(&report.treatment),
    )
}
