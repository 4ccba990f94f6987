//! Forgiving field readers for model-produced records.
//!
//! Each helper reads whatever JSON value is present and coerces it to the
//! target type, falling back to "absent" instead of failing the whole record.
//! Used through `#[serde(deserialize_with = "...")]`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Whole numbers, accepting floats (rounded) and numeric strings.
pub fn integer<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => parse_decimal(&s).map(|f| f.round() as i64),
        _ => None,
    };
    Ok(raw.and_then(|v| T::try_from(v).ok()))
}

/// Decimal numbers, accepting a comma as decimal separator in strings.
pub fn decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_decimal(&s),
        _ => None,
    })
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
}

/// Booleans, accepting the yes/no words an operator would dictate.
pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "si" | "sì" | "yes" | "x" | "1" | "vero" => Some(true),
            "false" | "no" | "0" | "falso" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Nested group; anything that is not a readable object yields the default.
pub fn nested<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_object() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Array of groups, skipping entries that cannot be read.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Array of strings; a single string becomes a one-element list.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let to_text = |value: Value| match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().filter_map(to_text).collect(),
        other => to_text(other).into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Probe {
        #[serde(deserialize_with = "text")]
        text: Option<String>,
        #[serde(deserialize_with = "integer")]
        small: Option<u8>,
        #[serde(deserialize_with = "decimal")]
        decimal: Option<f64>,
        #[serde(deserialize_with = "flag")]
        flag: Option<bool>,
        #[serde(deserialize_with = "text_list")]
        items: Vec<String>,
    }

    fn probe(json: &str) -> Probe {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_coercions() {
        let p = probe(r#"{"text": 353353104, "small": "14", "decimal": "36,5", "flag": "sì", "items": "diabete"}"#);
        assert_eq!(p.text.as_deref(), Some("353353104"));
        assert_eq!(p.small, Some(14));
        assert_eq!(p.decimal, Some(36.5));
        assert_eq!(p.flag, Some(true));
        assert_eq!(p.items, vec!["diabete".to_string()]);
    }

    #[test]
    fn test_unreadable_values_become_absent() {
        let p = probe(r#"{"text": {"a": 1}, "small": 300, "decimal": "n/d", "flag": "forse", "items": [1, null, "", "ipertensione"]}"#);
        assert_eq!(p.text, None);
        assert_eq!(p.small, None);
        assert_eq!(p.decimal, None);
        assert_eq!(p.flag, None);
        assert_eq!(p.items, vec!["1".to_string(), "ipertensione".to_string()]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let p = probe("{}");
        assert!(p.text.is_none() && p.small.is_none() && p.items.is_empty());
    }
}
