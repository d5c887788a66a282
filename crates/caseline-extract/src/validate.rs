// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic field validation and normalization.
//!
//! This is the extraction fast path: pure functions over the message text,
//! no network, no clock dependency beyond an injected "today" for relative
//! dates. Invalid input produces a human-readable message that is surfaced
//! verbatim as the next chat reply.

use std::sync::LazyLock;

use caseline_core::AnswerMap;
use caseline_schema::{FieldDef, FieldType};
use chrono::{Duration, NaiveDate};
use regex::Regex;

use crate::ExtractionMethod;

/// A successful deterministic validation.
///
/// `values` may cover more than the target field (a full name fills both
/// name fields); `follow_up` carries the question to ask next when the
/// input was accepted but incomplete (first name without a last name).
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub values: AnswerMap,
    pub method: ExtractionMethod,
    pub follow_up: Option<String>,
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap()
});

static ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").unwrap());

static DAYS_AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(day|week|month)s?\s+ago").unwrap());

/// Validate and normalize a message against one field definition.
///
/// `today` anchors relative-date resolution; callers outside tests pass the
/// current server date.
pub fn validate_field(
    raw: &str,
    field: &FieldDef,
    known: &AnswerMap,
    today: NaiveDate,
) -> Result<Validated, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("Could you tell me a bit more?".to_string());
    }

    match field.field_type {
        FieldType::Phone => validate_phone(text).map(|phone| {
            Validated {
                values: single(&field.name, phone),
                method: ExtractionMethod::Regex,
                follow_up: None,
            }
        }),
        FieldType::Email => validate_email(text).map(|email| Validated {
            values: single(&field.name, email),
            method: ExtractionMethod::Regex,
            follow_up: None,
        }),
        FieldType::Zip => validate_zip(text).map(|zip| Validated {
            values: single(&field.name, zip),
            method: ExtractionMethod::Regex,
            follow_up: None,
        }),
        FieldType::Date => parse_date(text, today)
            .map(|date| Validated {
                values: single(&field.name, date.format("%Y-%m-%d").to_string()),
                method: ExtractionMethod::Regex,
                follow_up: None,
            })
            .ok_or_else(|| {
                "I couldn't make out the date. Could you give it like 2025-06-01, \
                 or say something like \"yesterday\"?"
                    .to_string()
            }),
        FieldType::YesNo => validate_yes_no(text).map(|answer| Validated {
            values: single(&field.name, answer),
            method: ExtractionMethod::Regex,
            follow_up: None,
        }),
        FieldType::FirstName => validate_first_name(text),
        FieldType::LastName => validate_last_name(text, known),
        FieldType::Text => Ok(Validated {
            values: single(&field.name, text.to_string()),
            method: ExtractionMethod::Regex,
            follow_up: None,
        }),
    }
}

fn single(name: &str, value: String) -> AnswerMap {
    let mut map = AnswerMap::new();
    map.insert(name.to_string(), value);
    map
}

/// Strip non-digits and canonicalize to `(xxx) xxx-xxxx`.
///
/// Accepts exactly 10 digits, or 11 with a leading country code of 1.
pub fn validate_phone(text: &str) -> Result<String, String> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.strip_prefix('1').filter(|_| digits.len() == 11).unwrap_or(&digits);
    if digits.len() != 10 {
        return Err(
            "That doesn't look like a valid phone number. Could you share a \
             10-digit phone number?"
                .to_string(),
        );
    }
    Ok(format!(
        "({}) {}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..10]
    ))
}

/// Syntactic email check; no deliverability probing.
pub fn validate_email(text: &str) -> Result<String, String> {
    EMAIL_RE
        .find(text)
        .map(|m| m.as_str().to_lowercase())
        .ok_or_else(|| {
            "That doesn't look like a valid email address. Could you double-check it?"
                .to_string()
        })
}

/// 5-digit (optionally +4) ZIP. Returns the matched ZIP as typed.
pub fn validate_zip(text: &str) -> Result<String, String> {
    ZIP_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            "That doesn't look like a valid ZIP code. Could you share your \
             5-digit ZIP code?"
                .to_string()
        })
}

/// The bare 5-digit prefix of a validated ZIP, for geocoding lookups.
pub fn zip_prefix(zip: &str) -> &str {
    &zip[..5.min(zip.len())]
}

/// Parse absolute (`2025-06-01`, `6/1/2025`) and relative ("yesterday",
/// "last week", "3 days ago") date phrasing against `today`.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = text.trim();
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%B %d, %Y", "%B %d %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    let lowered = trimmed.to_lowercase();
    if lowered.contains("today") || lowered.contains("this morning") {
        return Some(today);
    }
    if lowered.contains("yesterday") {
        return Some(today - Duration::days(1));
    }
    if lowered.contains("last week") || lowered.contains("a week ago") {
        return Some(today - Duration::weeks(1));
    }
    if lowered.contains("last month") || lowered.contains("a month ago") {
        return Some(today - Duration::days(30));
    }
    if let Some(caps) = DAYS_AGO_RE.captures(&lowered) {
        let n: i64 = caps[1].parse().ok()?;
        let delta = match &caps[2] {
            "day" => Duration::days(n),
            "week" => Duration::weeks(n),
            _ => Duration::days(n * 30),
        };
        return Some(today - delta);
    }
    None
}

/// Normalize free-text affirmative/negative phrasing to `"yes"`/`"no"`.
pub fn validate_yes_no(text: &str) -> Result<String, String> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    const NEGATIVE: &[&str] = &[
        "no", "nope", "nah", "not", "never", "wasn't", "didn't", "don't", "haven't",
    ];
    const AFFIRMATIVE: &[&str] = &[
        "yes", "yeah", "yep", "yup", "sure", "correct", "right", "absolutely", "definitely",
    ];

    // Negation wins: "no I wasn't" contains neither bare affirmative,
    // but "yes, not my fault" should still read as a negative answer
    // to a fault question -- the explicit negative is the stronger signal.
    if words.iter().any(|w| NEGATIVE.contains(w)) {
        return Ok("no".to_string());
    }
    if words.iter().any(|w| AFFIRMATIVE.contains(w)) || lowered.contains("i was") || lowered.contains("i did") {
        return Ok("yes".to_string());
    }
    Err("Just to be sure -- is that a yes or a no?".to_string())
}

/// Common words that rule a token out as part of a person's name.
const NAME_STOPWORDS: &[&str] = &[
    "i", "me", "my", "was", "am", "is", "a", "an", "the", "in", "on", "at", "and", "to", "of",
    "it", "its", "it's", "yes", "no", "name",
];

/// Tokens that are plausibly part of a person's name.
///
/// Returns empty for prose: more than four words after stripping the
/// lead-in, or any stopword token, means this is not a name answer.
fn name_tokens(text: &str) -> Vec<String> {
    let stripped = strip_name_prefix(text);
    if stripped.split_whitespace().count() > 4 {
        return Vec::new();
    }
    let tokens: Vec<String> = stripped
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphabetic() && c != '\'' && c != '-'))
        .filter(|w| !w.is_empty() && w.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-'))
        .map(capitalize)
        .collect();
    if tokens
        .iter()
        .any(|t| NAME_STOPWORDS.contains(&t.to_lowercase().as_str()))
    {
        return Vec::new();
    }
    tokens
}

/// Strip lead-ins like "my name is" so bare names survive tokenization.
fn strip_name_prefix(text: &str) -> &str {
    let lowered = text.to_lowercase();
    let prefixes = [
        "my name is ",
        "my name's ",
        "this is ",
        "i'm ",
        "i am ",
        "it's ",
        "name is ",
    ];
    for prefix in prefixes {
        if let Some(pos) = lowered.find(prefix) {
            return &text[pos + prefix.len()..];
        }
    }
    text
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Two-stage name handling, first-name target.
///
/// "First Last" fills both name fields in one pass; a single token fills
/// `first_name` and emits a follow-up asking for the last name.
fn validate_first_name(text: &str) -> Result<Validated, String> {
    let tokens = name_tokens(text);
    match tokens.len() {
        0 => Err("I didn't catch your name. Could you share it?".to_string()),
        1 => {
            let first = tokens[0].clone();
            let follow_up = format!("Nice to meet you, {first}! And your last name?");
            Ok(Validated {
                values: single("first_name", first),
                method: ExtractionMethod::PartialNameParsed,
                follow_up: Some(follow_up),
            })
        }
        _ => {
            let mut values = AnswerMap::new();
            values.insert("first_name".to_string(), tokens[0].clone());
            values.insert("last_name".to_string(), tokens[1..].join(" "));
            Ok(Validated {
                values,
                method: ExtractionMethod::FullNameParsed,
                follow_up: None,
            })
        }
    }
}

/// Last-name target: completes the pair when the first name is known,
/// otherwise falls back to full-name parsing.
fn validate_last_name(text: &str, known: &AnswerMap) -> Result<Validated, String> {
    let tokens = name_tokens(text);
    if tokens.is_empty() {
        return Err("I didn't catch your last name. Could you share it?".to_string());
    }
    if known.get("first_name").is_some_and(|v| !v.is_empty()) {
        return Ok(Validated {
            values: single("last_name", tokens.join(" ")),
            method: ExtractionMethod::LastNameCompleted,
            follow_up: None,
        });
    }
    validate_first_name(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseline_schema::SchemaRegistry;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn field(name: &str) -> FieldDef {
        let registry = SchemaRegistry::embedded().unwrap();
        registry
            .field("personal_injury", name)
            .expect("field exists")
            .clone()
    }

    #[test]
    fn phone_formats_ten_digits() {
        assert_eq!(validate_phone("5551234567").unwrap(), "(555) 123-4567");
        assert_eq!(validate_phone("(555) 123-4567").unwrap(), "(555) 123-4567");
        assert_eq!(validate_phone("555.123.4567").unwrap(), "(555) 123-4567");
        assert_eq!(
            validate_phone("my number is 555-123-4567").unwrap(),
            "(555) 123-4567"
        );
    }

    #[test]
    fn phone_accepts_leading_country_code() {
        assert_eq!(validate_phone("15551234567").unwrap(), "(555) 123-4567");
        assert_eq!(validate_phone("+1 555 123 4567").unwrap(), "(555) 123-4567");
    }

    #[test]
    fn phone_rejects_wrong_length_with_readable_message() {
        let err = validate_phone("invalid phone").unwrap_err();
        assert!(err.contains("phone number"));
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("555123456789").is_err());
    }

    #[test]
    fn email_extracts_and_lowercases() {
        assert_eq!(
            validate_email("you can reach me at Jane.Doe@Example.COM thanks").unwrap(),
            "jane.doe@example.com"
        );
        assert!(validate_email("no email here").is_err());
        assert!(validate_email("broken@").is_err());
    }

    #[test]
    fn zip_accepts_five_and_nine_digit_forms() {
        assert_eq!(validate_zip("94102").unwrap(), "94102");
        assert_eq!(validate_zip("94102-1234").unwrap(), "94102-1234");
        assert_eq!(zip_prefix("94102-1234"), "94102");
        assert!(validate_zip("941").is_err());
    }

    #[test]
    fn date_parses_absolute_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(parse_date("2025-06-01", today()), Some(d));
        assert_eq!(parse_date("6/1/2025", today()), Some(d));
        assert_eq!(parse_date("06-01-2025", today()), Some(d));
    }

    #[test]
    fn date_resolves_relative_phrases() {
        assert_eq!(
            parse_date("yesterday", today()),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
        assert_eq!(
            parse_date("it happened yesterday", today()),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
        assert_eq!(
            parse_date("last week", today()),
            NaiveDate::from_ymd_opt(2026, 3, 8)
        );
        assert_eq!(
            parse_date("3 days ago", today()),
            NaiveDate::from_ymd_opt(2026, 3, 12)
        );
        assert_eq!(parse_date("today", today()), Some(today()));
        assert_eq!(parse_date("no date here", today()), None);
    }

    #[test]
    fn yes_no_normalizes_phrasing() {
        assert_eq!(validate_yes_no("yes").unwrap(), "yes");
        assert_eq!(validate_yes_no("Yeah, I was").unwrap(), "yes");
        assert_eq!(validate_yes_no("nope").unwrap(), "no");
        assert_eq!(validate_yes_no("I wasn't at fault").unwrap(), "no");
        assert!(validate_yes_no("maybe").is_err());
    }

    #[test]
    fn full_name_fills_both_fields() {
        let result =
            validate_field("John Smith", &field("first_name"), &AnswerMap::new(), today())
                .unwrap();
        assert_eq!(result.method, ExtractionMethod::FullNameParsed);
        assert_eq!(result.values.get("first_name").unwrap(), "John");
        assert_eq!(result.values.get("last_name").unwrap(), "Smith");
        assert!(result.follow_up.is_none());
    }

    #[test]
    fn full_name_with_lead_in_phrase() {
        let result = validate_field(
            "my name is jane doe",
            &field("first_name"),
            &AnswerMap::new(),
            today(),
        )
        .unwrap();
        assert_eq!(result.values.get("first_name").unwrap(), "Jane");
        assert_eq!(result.values.get("last_name").unwrap(), "Doe");
    }

    #[test]
    fn single_token_asks_for_last_name() {
        let result =
            validate_field("Maria", &field("first_name"), &AnswerMap::new(), today()).unwrap();
        assert_eq!(result.method, ExtractionMethod::PartialNameParsed);
        assert_eq!(result.values.get("first_name").unwrap(), "Maria");
        assert!(result.values.get("last_name").is_none());
        assert!(result.follow_up.unwrap().contains("last name"));
    }

    #[test]
    fn last_name_completes_known_first_name() {
        let mut known = AnswerMap::new();
        known.insert("first_name".to_string(), "Maria".to_string());
        let result =
            validate_field("Garcia", &field("last_name"), &known, today()).unwrap();
        assert_eq!(result.method, ExtractionMethod::LastNameCompleted);
        assert_eq!(result.values.get("last_name").unwrap(), "Garcia");
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(validate_field("   ", &field("phone"), &AnswerMap::new(), today()).is_err());
    }

    #[test]
    fn text_field_accepts_verbatim() {
        let result = validate_field(
            "rear-ended at a stoplight",
            &field("description"),
            &AnswerMap::new(),
            today(),
        )
        .unwrap();
        assert_eq!(
            result.values.get("description").unwrap(),
            "rear-ended at a stoplight"
        );
    }
}
