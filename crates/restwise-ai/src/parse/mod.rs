//! Tolerant decoding of free-form model output.
//!
//! Model replies are asked to be a single JSON object but routinely arrive
//! wrapped in markdown fences, prefixed with prose, truncated, or as
//! `KEY: value` lines. [`parse_response`] sorts every reply into exactly one of
//! three outcomes so callers can pattern-match instead of probing for keys.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AdvisorError;

/// Best-effort fields recovered from a reply that did not decode strictly.
/// Keys are upper-cased with spaces and dashes turned into underscores.
pub type PartialFields = BTreeMap<String, String>;

const MAX_KEY_LEN: usize = 40;

/// Semantic checks applied after a strict decode succeeded
pub trait Validate {
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    fn validate(&self) -> Result<(), String>;
}

/// Outcome of decoding one advisor reply
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    WellFormed(T),
    PartiallyParsed(PartialFields),
    Unusable,
}

impl<T> Parsed<T> {
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        matches!(self, Self::WellFormed(_))
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WellFormed(_) => "well-formed",
            Self::PartiallyParsed(_) => "partial",
            Self::Unusable => "unusable",
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        match self {
            Self::WellFormed(value) => Parsed::WellFormed(f(value)),
            Self::PartiallyParsed(fields) => Parsed::PartiallyParsed(fields),
            Self::Unusable => Parsed::Unusable,
        }
    }

    /// Keep only a well-formed value
    ///
    /// # Errors
    ///
    /// Returns `AdvisorError::Malformed` for partial and unusable replies.
    pub fn into_result(self) -> Result<T, AdvisorError> {
        match self {
            Self::WellFormed(value) => Ok(value),
            Self::PartiallyParsed(fields) => Err(AdvisorError::Malformed(format!(
                "only partial fields recovered: {}",
                fields.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
            Self::Unusable => Err(AdvisorError::Malformed("nothing recoverable".to_string())),
        }
    }
}

/// Decode a model reply into `T`
#[must_use]
pub fn parse_response<T: DeserializeOwned + Validate>(raw: &str) -> Parsed<T> {
    let text = strip_fences(raw);

    if let Some(object) = extract_json_object(text) {
        match serde_json::from_str::<T>(object) {
            Ok(value) => match value.validate() {
                Ok(()) => return Parsed::WellFormed(value),
                Err(reason) => log::debug!("Advisor reply failed validation: {reason}"),
            },
            Err(e) => log::debug!("Advisor reply is not strict JSON: {e}"),
        }

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(object) {
            let fields: PartialFields = map
                .into_iter()
                .filter_map(|(key, value)| Some((normalize_key(&key)?, flatten_value(value)?)))
                .collect();
            if !fields.is_empty() {
                return Parsed::PartiallyParsed(fields);
            }
        }
    }

    let fields = key_value_lines(text);
    if fields.is_empty() {
        Parsed::Unusable
    } else {
        Parsed::PartiallyParsed(fields)
    }
}

fn strip_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Slice from the first `{` to the last `}`
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn flatten_value(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .filter_map(flatten_value)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn key_value_lines(text: &str) -> PartialFields {
    text.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(|c: char| {
                c == '-' || c == '*' || c == '.' || c == ')' || c.is_ascii_digit() || c.is_whitespace()
            });
            let (key, value) = line.split_once(':')?;
            let key = normalize_key(key)?;
            let value = value
                .trim()
                .trim_end_matches(',')
                .trim()
                .trim_matches('"')
                .trim();
            (!value.is_empty()).then(|| (key, value.to_string()))
        })
        .collect()
}

fn normalize_key(raw: &str) -> Option<String> {
    let key = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '{' || c == ',')
        .trim();
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.starts_with(|c: char| c.is_ascii_alphabetic())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '-');
    valid.then(|| key.to_ascii_uppercase().replace([' ', '-'], "_"))
}

#[cfg(test)]
mod tests;
