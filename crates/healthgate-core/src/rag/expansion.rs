//! Best-effort query expansion with related medical terms.

use std::sync::Arc;

use crate::llm_json::{strip_code_fences, strip_wrapping_quotes};
use crate::services::{GenerationParams, GenerationService};

const MAX_EXPANSION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedQuery {
    pub text: String,
    /// False when the original query was used unchanged.
    pub expanded: bool,
}

impl ExpandedQuery {
    pub fn unchanged(query: &str) -> Self {
        Self {
            text: query.to_string(),
            expanded: false,
        }
    }
}

pub struct QueryExpander {
    llm: Arc<dyn GenerationService>,
    params: GenerationParams,
}

impl QueryExpander {
    pub fn new(llm: Arc<dyn GenerationService>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    /// Append synonyms to `query`. Any failure falls back to the query as is.
    pub async fn expand(&self, query: &str) -> ExpandedQuery {
        let prompt = format!(
            "Dato il termine medico: {}\n\
             Genera 3 sinonimi o termini correlati in italiano.\n\
             Rispondi SOLO con i termini separati da virgole.",
            query
        );

        match self.llm.generate(&prompt, &self.params).await {
            Ok(reply) => match sanitize_terms(&reply) {
                Some(terms) => {
                    tracing::debug!(terms = %terms, "Query expanded");
                    ExpandedQuery {
                        text: format!("{} {}", query, terms),
                        expanded: true,
                    }
                }
                None => {
                    tracing::debug!("Query expansion returned no usable terms");
                    ExpandedQuery::unchanged(query)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Query expansion failed, using original query");
                ExpandedQuery::unchanged(query)
            }
        }
    }
}

/// Clean a comma-separated term list, or `None` when nothing usable is left.
fn sanitize_terms(reply: &str) -> Option<String> {
    let cleaned = strip_wrapping_quotes(strip_code_fences(reply));
    let collapsed = cleaned
        .split(',')
        .map(|term| term.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_EXPANSION_CHARS).collect())
}
