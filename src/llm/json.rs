//! Reading structured JSON out of free-form model replies.

use crate::error::DistillError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)\n?\s*```").expect("valid fence regex")
});

/// Parse a JSON object from a model reply, tolerating Markdown fences.
pub fn parse_llm_json(text: &str) -> Result<Map<String, Value>, DistillError> {
    let stripped = text.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(stripped) {
        return Ok(map);
    }

    if let Some(inner) = FENCED_BLOCK.captures(stripped).and_then(|c| c.get(1)) {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(inner.as_str().trim()) {
            return Ok(map);
        }
    }

    let preview: String = text.chars().take(500).collect();
    Err(DistillError::InvalidModelJson(preview))
}

/// String field, if present and a string.
pub fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(String::from)
}

/// Array of strings; non-string entries are skipped, a missing field is empty.
pub fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
