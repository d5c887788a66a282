// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with fuzzy match suggestions.
//!
//! Converts Figment deserialization errors into miette diagnostics with
//! "did you mean?" suggestions using Jaro-Winkler string similarity.

use miette::Diagnostic;
use thiserror::Error;

/// Minimum Jaro-Winkler similarity score to suggest a correction.
/// 0.75 catches common typos like `databse_path` -> `database_path`
/// while filtering noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with diagnostic context.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(caseline::config::unknown_key),
        help("{}", format_unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The unrecognized key name.
        key: String,
        /// Suggested correction via fuzzy matching, if any.
        suggestion: Option<String>,
        /// List of valid keys for the section.
        valid_keys: String,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(caseline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A required configuration key is missing.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(caseline::config::missing_key),
        help("add `{key} = <value>` to your caseline.toml")
    )]
    MissingKey { key: String },

    /// A semantic validation error for a config value.
    #[error("validation error: {message}")]
    #[diagnostic(code(caseline::config::validation))]
    Validation { message: String },

    /// A parse or I/O error that could not be classified further.
    #[error("configuration error: {message}")]
    #[diagnostic(code(caseline::config::parse))]
    Other { message: String },
}

fn format_unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert a Figment error (which may aggregate several failures) into
/// diagnostic errors, attaching fuzzy suggestions for unknown keys.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter().map(classify_figment_error).collect()
}

fn classify_figment_error(err: figment::Error) -> ConfigError {
    use figment::error::Kind;

    let path = err.path.join(".");
    match &err.kind {
        Kind::UnknownField(field, valid) => {
            let valid_names: Vec<&str> = valid.iter().map(|s| s.as_ref()).collect();
            ConfigError::UnknownKey {
                key: qualified_key(&err.path, field),
                suggestion: suggest(field, &valid_names),
                valid_keys: valid_names.join(", "),
            }
        }
        Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
            key: path,
            detail: format!("found {actual}"),
            expected: expected.clone(),
        },
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: qualified_key(&err.path, field),
        },
        _ => ConfigError::Other {
            message: err.to_string(),
        },
    }
}

/// Join the error path with the offending field, e.g. `gateway.prot`.
fn qualified_key(path: &[String], field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", path.join("."))
    }
}

/// Find the closest valid key by Jaro-Winkler similarity, if close enough.
fn suggest(key: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|candidate| (candidate, strsim::jaro_winkler(key, candidate)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate.to_string())
}

/// Render a list of config errors to stderr via miette's fancy reporter.
pub fn render_errors(errors: &[ConfigError]) {
    for err in errors {
        eprintln!("{:?}", miette::Report::msg(err.to_string()));
        if let Some(help) = err.help() {
            eprintln!("  help: {help}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_catches_close_typo() {
        let valid = ["database_path", "wal_mode"];
        assert_eq!(
            suggest("databse_path", &valid),
            Some("database_path".to_string())
        );
    }

    #[test]
    fn suggest_rejects_distant_key() {
        let valid = ["database_path", "wal_mode"];
        assert_eq!(suggest("zzzzz", &valid), None);
    }

    #[test]
    fn qualified_key_joins_path() {
        assert_eq!(
            qualified_key(&["gateway".to_string()], "prot"),
            "gateway.prot"
        );
        assert_eq!(qualified_key(&[], "agent"), "agent");
    }

    #[test]
    fn unknown_key_help_mentions_suggestion() {
        let help = format_unknown_key_help(Some("port"), "host, port");
        assert!(help.contains("did you mean `port`?"));
        let help = format_unknown_key_help(None, "host, port");
        assert!(help.starts_with("valid keys:"));
    }
}
