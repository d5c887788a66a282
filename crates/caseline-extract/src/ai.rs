// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative extraction fallback: prompt construction and lenient
//! response parsing.
//!
//! The model is asked for a flat JSON object restricted to the candidate
//! field list; anything else in the response is discarded. Parse failures
//! return an empty map so callers fall back to re-asking.

use caseline_core::AnswerMap;
use caseline_schema::FieldDef;
use tracing::{debug, warn};

/// Prompt template for multi-field extraction.
const EXTRACTION_PROMPT: &str = r#"You are extracting intake form fields from a message written by a prospective legal client.

Fields already known (do not re-extract): {known}

Extract ONLY these fields, and only if the message clearly states them:
{candidates}

Rules:
- Respond with a flat JSON object mapping field names to string values.
- Use only field names from the list above.
- Omit any field you cannot find confidently. Never guess or fabricate a value.
- Dates must be formatted YYYY-MM-DD. Phone numbers must keep all digits.
- If nothing can be extracted, respond with {}.

Message:
{message}

Output the JSON object only, no explanation:"#;

/// Prompt template for category classification.
const CATEGORIZE_PROMPT: &str = r#"Classify this message from a prospective legal client into exactly one practice area.

Practice areas:
{categories}

Respond with the practice area id only (e.g. "personal_injury"). If none fit, respond with "none".

Message:
{message}

Practice area id:"#;

/// Build the extraction prompt for a message and candidate field set.
pub fn build_extraction_prompt(
    message: &str,
    candidates: &[&FieldDef],
    known: &AnswerMap,
) -> String {
    let known_list = if known.is_empty() {
        "(none)".to_string()
    } else {
        known
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let candidate_list = candidates
        .iter()
        .map(|f| format!("- {} ({})", f.name, f.field_type))
        .collect::<Vec<_>>()
        .join("\n");

    EXTRACTION_PROMPT
        .replace("{known}", &known_list)
        .replace("{candidates}", &candidate_list)
        .replace("{message}", message)
}

/// Build the classification prompt for the configured category list.
pub fn build_categorize_prompt(message: &str, categories: &[(String, String)]) -> String {
    let category_list = categories
        .iter()
        .map(|(id, label)| format!("- {id}: {label}"))
        .collect::<Vec<_>>()
        .join("\n");

    CATEGORIZE_PROMPT
        .replace("{categories}", &category_list)
        .replace("{message}", message)
}

/// Parse the model's extraction response into a flat string map.
///
/// Handles markdown code fences and surrounding prose by slicing to the
/// outermost braces. Non-string JSON values are stringified; nested values
/// and parse failures are dropped with a warning, never an error.
pub fn parse_flat_object(response: &str) -> AnswerMap {
    let trimmed = response.trim();
    let start = match trimmed.find('{') {
        Some(i) => i,
        None => {
            warn!("extraction response contains no JSON object");
            return AnswerMap::new();
        }
    };
    let end = trimmed.rfind('}').map(|i| i + 1).unwrap_or(trimmed.len());
    let json_str = &trimmed[start..end];

    let parsed: serde_json::Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("failed to parse extraction response: {e}");
            debug!("raw response: {response}");
            return AnswerMap::new();
        }
    };

    let mut map = AnswerMap::new();
    if let serde_json::Value::Object(obj) = parsed {
        for (key, value) in obj {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if !text.trim().is_empty() {
                map.insert(key, text.trim().to_string());
            }
        }
    }
    map
}

/// Parse a classification response down to a known category id.
pub fn parse_category(response: &str, known: &[String]) -> Option<String> {
    let cleaned = response
        .trim()
        .trim_matches(|c| c == '"' || c == '`' || c == '.')
        .to_lowercase();
    known.iter().find(|c| c.as_str() == cleaned).cloned()
}
