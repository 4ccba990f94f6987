//! Reading a single JSON object out of free-form model output.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::ParseError;

static FENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fenced JSON regex is valid")
});

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(output: &str) -> &str {
    output
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Remove triple quotes or a single pair of quotes wrapped around a reply.
pub fn strip_wrapping_quotes(output: &str) -> &str {
    let trimmed = output.trim();
    for quote in ["\"\"\"", "'''", "\""] {
        if trimmed.len() >= 2 * quote.len() && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[quote.len()..trimmed.len() - quote.len()].trim();
        }
    }
    trimmed
}

/// Extract the JSON object a model was asked to produce.
///
/// Tries, in order: the whole output with fences removed, a fenced block
/// anywhere in the text, then the outermost `{ ... }` span.
pub fn extract_json_object(output: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    let stripped = strip_code_fences(output);
    if stripped.is_empty() {
        return Err(ParseError::NoJsonObject);
    }

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return match value {
            Value::Object(map) => Ok(map),
            _ => Err(ParseError::NoJsonObject),
        };
    }

    if let Some(captures) = FENCED_OBJECT.captures(output) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&captures[1]) {
            return Ok(map);
        }
    }

    let (Some(start), Some(end)) = (stripped.find('{'), stripped.rfind('}')) else {
        return Err(ParseError::NoJsonObject);
    };
    if end < start {
        return Err(ParseError::NoJsonObject);
    }

    match serde_json::from_str::<Value>(&stripped[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseError::NoJsonObject),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}
