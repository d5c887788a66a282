// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered field extraction.
//!
//! Strategy order: deterministic pattern validation on the target field
//! (fast, free, unit-testable), then the generative fallback for rich
//! multi-fact messages or when the pattern misses. Provider failures never
//! escape -- they collapse to an `ai_failed` outcome so the engine re-asks.

use std::sync::Arc;

use caseline_core::{AnswerMap, GeoLookup, ModelProvider, ModelRequest};
use caseline_schema::FieldDef;
use tracing::{debug, warn};

use crate::ai;
use crate::validate::{self, Validated};
use crate::{ExtractionMethod, ExtractionOutcome};

/// Layered extractor over an optional generative backend and a geocoder.
///
/// With no provider configured the extractor is fully deterministic.
pub struct Extractor {
    provider: Option<Arc<dyn ModelProvider>>,
    geo: Arc<dyn GeoLookup>,
    max_tokens: u32,
}

impl Extractor {
    pub fn new(
        provider: Option<Arc<dyn ModelProvider>>,
        geo: Arc<dyn GeoLookup>,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            geo,
            max_tokens,
        }
    }

    /// Extract field values from one message.
    ///
    /// `target` is the field the current question asked about; `candidates`
    /// is the full remaining-field list offered to the generative fallback.
    pub async fn extract(
        &self,
        message: &str,
        target: Option<&FieldDef>,
        known: &AnswerMap,
        candidates: &[&FieldDef],
    ) -> ExtractionOutcome {
        let today = chrono::Utc::now().date_naive();

        if is_rich_message(message, known) {
            return self
                .extract_rich(message, target, known, candidates, today)
                .await;
        }

        let Some(target) = target else {
            return ExtractionOutcome::Empty {
                method: ExtractionMethod::Regex,
            };
        };

        match validate::validate_field(message, target, known, today) {
            Ok(validated) => self.finish_validated(validated).await,
            Err(pattern_error) => {
                // Pattern missed; let the model try before surfacing the
                // clarification.
                match self.ai_values(message, known, candidates).await {
                    Ok(values) if !values.is_empty() => {
                        let values = self.enrich_zip(values).await;
                        ExtractionOutcome::Fields {
                            values,
                            method: ExtractionMethod::Ai,
                        }
                    }
                    Ok(_) => ExtractionOutcome::Invalid {
                        field: target.name.clone(),
                        message: pattern_error,
                    },
                    Err(()) => ExtractionOutcome::Empty {
                        method: ExtractionMethod::AiFailed,
                    },
                }
            }
        }
    }

    /// Rich multi-fact message: generative extraction first, deterministic
    /// target validation as the fallback.
    async fn extract_rich(
        &self,
        message: &str,
        target: Option<&FieldDef>,
        known: &AnswerMap,
        candidates: &[&FieldDef],
        today: chrono::NaiveDate,
    ) -> ExtractionOutcome {
        let ai_result = self.ai_values(message, known, candidates).await;
        match ai_result {
            Ok(values) if !values.is_empty() => {
                let values = self.enrich_zip(values).await;
                return ExtractionOutcome::Fields {
                    values,
                    method: ExtractionMethod::Ai,
                };
            }
            Ok(_) => {}
            Err(()) => {
                // Provider down; the deterministic layer may still rescue
                // the target field before we report ai_failed.
                if let Some(target) = target
                    && let Ok(validated) =
                        validate::validate_field(message, target, known, today)
                {
                    return self.finish_validated(validated).await;
                }
                return ExtractionOutcome::Empty {
                    method: ExtractionMethod::AiFailed,
                };
            }
        }

        match target {
            Some(target) => match validate::validate_field(message, target, known, today) {
                Ok(validated) => self.finish_validated(validated).await,
                Err(message) => ExtractionOutcome::Invalid {
                    field: target.name.clone(),
                    message,
                },
            },
            None => ExtractionOutcome::Empty {
                method: ExtractionMethod::Regex,
            },
        }
    }

    async fn finish_validated(&self, validated: Validated) -> ExtractionOutcome {
        let Validated {
            values,
            method,
            follow_up,
        } = validated;
        let values = self.enrich_zip(values).await;
        match follow_up {
            Some(question) => ExtractionOutcome::FollowUp {
                values,
                question,
                method,
            },
            None => ExtractionOutcome::Fields { values, method },
        }
    }

    /// Run the generative fallback and validate its output field by field.
    ///
    /// `Err(())` means the provider itself failed; `Ok(empty)` means it
    /// answered but found nothing usable.
    async fn ai_values(
        &self,
        message: &str,
        known: &AnswerMap,
        candidates: &[&FieldDef],
    ) -> Result<AnswerMap, ()> {
        let Some(provider) = &self.provider else {
            return Ok(AnswerMap::new());
        };
        if candidates.is_empty() {
            return Ok(AnswerMap::new());
        }

        let prompt = ai::build_extraction_prompt(message, candidates, known);
        let response = match provider
            .complete(ModelRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("generative extraction failed: {e}");
                return Err(());
            }
        };

        let raw = ai::parse_flat_object(&response.text);
        Ok(self.validate_ai_values(raw, known, candidates))
    }

    /// Keep only candidate fields whose values survive deterministic
    /// validation; the model's output is never trusted directly.
    fn validate_ai_values(
        &self,
        raw: AnswerMap,
        known: &AnswerMap,
        candidates: &[&FieldDef],
    ) -> AnswerMap {
        let today = chrono::Utc::now().date_naive();
        let mut values = AnswerMap::new();
        for (key, value) in raw {
            let Some(field) = candidates.iter().find(|f| f.name == key) else {
                debug!(field = %key, "dropping hallucinated field from extraction");
                continue;
            };
            match validate::validate_field(&value, field, known, today) {
                Ok(validated) => {
                    for (name, normalized) in validated.values {
                        // A first-name candidate may legitimately produce a
                        // last_name too; anything else stays keyed as asked.
                        values.insert(name, normalized);
                    }
                }
                Err(_) => {
                    debug!(field = %key, "dropping AI value that failed validation");
                }
            }
        }
        values
    }

    /// Best-effort ZIP enrichment; lookup failure leaves city/state unset.
    async fn enrich_zip(&self, mut values: AnswerMap) -> AnswerMap {
        let Some(zip) = values.get("zip_code").cloned() else {
            return values;
        };
        match self.geo.lookup(validate::zip_prefix(&zip)).await {
            Some(place) => {
                values.insert("city".to_string(), place.city);
                values.insert("state".to_string(), place.state);
            }
            None => {
                debug!(zip = %zip, "geocoding lookup failed, keeping bare ZIP");
            }
        }
        values
    }
}

/// Heuristic for messages likely to carry several facts at once.
///
/// Fires on greetings and self-introductions paired with an empty answer
/// set, on first-person narration ("I was", "I got"), and on long prose.
pub fn is_rich_message(message: &str, known: &AnswerMap) -> bool {
    let lowered = message.to_lowercase();
    let word_count = lowered.split_whitespace().count();

    const NARRATION: &[&str] = &[
        "my name is",
        "my number",
        "my phone",
        "my email",
        "i was",
        "i got",
        "i had",
        "i've been",
        "i have been",
    ];
    if NARRATION.iter().any(|phrase| lowered.contains(phrase)) {
        return true;
    }

    const GREETINGS: &[&str] = &["hi", "hey", "hello", "good morning", "good afternoon"];
    if known.is_empty()
        && word_count > 3
        && GREETINGS.iter().any(|g| lowered.starts_with(g))
    {
        return true;
    }

    word_count >= 12
}
