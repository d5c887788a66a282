// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered field extraction and validation for the intake conversation.
//!
//! Two strategies compose: deterministic pattern validation (fast, free,
//! fully unit-testable) and a generative fallback for rich unstructured
//! prose. Results flow through the tagged [`ExtractionOutcome`] type so
//! callers exhaustively handle fields, follow-ups, clarifications, and
//! backend failure instead of probing ad hoc properties.

pub mod ai;
pub mod extractor;
pub mod validate;

use strum::{Display, EnumString};

pub use extractor::{is_rich_message, Extractor};
pub use validate::{validate_field, Validated};

/// How a value was produced, recorded for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionMethod {
    Regex,
    FullNameParsed,
    PartialNameParsed,
    LastNameCompleted,
    Ai,
    AiFailed,
}

/// Result of running the extractor against one message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// One or more validated values ready to merge.
    Fields {
        values: caseline_core::AnswerMap,
        method: ExtractionMethod,
    },
    /// Values to merge plus an immediate follow-up question (partial name).
    FollowUp {
        values: caseline_core::AnswerMap,
        question: String,
        method: ExtractionMethod,
    },
    /// The message failed validation for the target field; `message` is
    /// surfaced verbatim as the next reply.
    Invalid { field: String, message: String },
    /// Nothing extracted. `AiFailed` means the generative backend errored
    /// and the caller should re-ask the current question.
    Empty { method: ExtractionMethod },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn extraction_method_tags_match_wire_names() {
        assert_eq!(ExtractionMethod::Regex.to_string(), "regex");
        assert_eq!(ExtractionMethod::FullNameParsed.to_string(), "full_name_parsed");
        assert_eq!(
            ExtractionMethod::PartialNameParsed.to_string(),
            "partial_name_parsed"
        );
        assert_eq!(
            ExtractionMethod::LastNameCompleted.to_string(),
            "last_name_completed"
        );
        assert_eq!(ExtractionMethod::AiFailed.to_string(), "ai_failed");
        assert_eq!(
            ExtractionMethod::from_str("ai_failed").unwrap(),
            ExtractionMethod::AiFailed
        );
    }
}
