// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state machine.
//!
//! Owns stage transitions (init -> categorized -> collecting ->
//! ready_to_submit -> submitted), decides the next missing field, merges
//! validated extractions into the session, and hands completed leads to
//! the delivery queue. Failures inside a turn resolve to a conversational
//! reply; nothing here surfaces a raw error to the visitor.

use std::sync::Arc;

use caseline_core::types::now_iso;
use caseline_core::{
    AnswerMap, CaselineError, ClientMeta, LeadPayload, LeadStatus, LeadStore, ModelProvider,
    ModelRequest, Session, SessionUpdate, Stage, TranscriptEntry,
};
use caseline_extract::{ai, validate, ExtractionMethod, ExtractionOutcome, Extractor};
use caseline_schema::{FieldDef, SchemaRegistry};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one conversational turn.
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub session_id: String,
    pub reply: String,
    pub stage: Stage,
    pub lead_status: Option<LeadStatus>,
}

/// The intake conversation engine.
pub struct IntakeEngine {
    store: Arc<dyn LeadStore>,
    schema: Arc<SchemaRegistry>,
    extractor: Extractor,
    /// Classification fallback when keyword detection misses.
    provider: Option<Arc<dyn ModelProvider>>,
    queue_name: String,
    max_attempts: i32,
    max_tokens: u32,
}

impl IntakeEngine {
    pub fn new(
        store: Arc<dyn LeadStore>,
        schema: Arc<SchemaRegistry>,
        extractor: Extractor,
        provider: Option<Arc<dyn ModelProvider>>,
        queue_name: String,
        max_attempts: i32,
        max_tokens: u32,
    ) -> Self {
        Self {
            store,
            schema,
            extractor,
            provider,
            queue_name,
            max_attempts,
            max_tokens,
        }
    }

    /// Process one inbound chat message.
    ///
    /// A supplied session id that exists resumes the conversation; an
    /// unknown one creates a session under that id (the client owns
    /// identity continuity). With no id at all, a fresh session is minted.
    pub async fn handle_message(
        &self,
        session_id: Option<String>,
        text: &str,
        meta: &ClientMeta,
    ) -> Result<EngineReply, CaselineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CaselineError::Channel {
                message: "message must be a non-empty string".into(),
                source: None,
            });
        }

        let session = match &session_id {
            Some(id) => match self.store.get_session(id).await? {
                Some(session) => session,
                None => {
                    self.store
                        .create_session(
                            Some(id.clone()),
                            &meta.ip,
                            &meta.user_agent,
                            meta.trusted_form_cert_url.clone(),
                        )
                        .await?
                }
            },
            None => {
                self.store
                    .create_session(
                        None,
                        &meta.ip,
                        &meta.user_agent,
                        meta.trusted_form_cert_url.clone(),
                    )
                    .await?
            }
        };

        self.record(&session.id, "user", text).await?;

        let (session, reply) = match session.stage {
            Stage::Init => self.handle_init(session, text).await?,
            Stage::Categorized | Stage::Collecting => {
                self.collect_step(session, text, false).await?
            }
            Stage::ReadyToSubmit => self.handle_confirmation(session, text).await?,
            Stage::Submitted => self.handle_post_submission(session).await?,
        };

        self.record(&session.id, "assistant", &reply).await?;

        Ok(EngineReply {
            session_id: session.id.clone(),
            reply,
            stage: session.stage,
            lead_status: session.lead_status,
        })
    }

    /// Explicit reset: the only backward transition.
    pub async fn reset(&self, session_id: &str) -> Result<Option<Session>, CaselineError> {
        info!(session_id, "resetting session to init");
        self.store.reset_session(session_id).await
    }

    // --- Stage handlers ---

    /// INIT: detect the practice area, freeze it, and fall through to
    /// collection on the same message (the rich-first-message case).
    async fn handle_init(
        &self,
        session: Session,
        text: &str,
    ) -> Result<(Session, String), CaselineError> {
        let detected = match self.schema.detect_category(text) {
            Some(pair) => Some(pair),
            None => self.classify_with_model(text).await,
        };

        let Some((main_category, sub_category)) = detected else {
            let reply = "I can help connect you with an attorney. Could you tell me a \
                         bit about your legal issue -- for example a car accident, a \
                         divorce, or a debt problem?"
                .to_string();
            return Ok((session, reply));
        };

        info!(
            session_id = %session.id,
            category = %main_category,
            sub_category = sub_category.as_deref().unwrap_or("-"),
            "conversation categorized"
        );

        let session = self
            .store
            .update_session(
                &session.id,
                SessionUpdate {
                    stage: Some(Stage::Categorized),
                    main_category: Some(main_category),
                    sub_category,
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| CaselineError::Internal("session vanished during categorization".into()))?;

        self.collect_step(session, text, true).await
    }

    /// COLLECTING: extract against the current missing field, merge, and
    /// either ask the next question or advance to ready_to_submit.
    ///
    /// `first_contact` marks the categorization message itself: extraction
    /// misses there are expected (the visitor was not answering a
    /// question), so they fall through to the opening question instead of
    /// a clarification.
    async fn collect_step(
        &self,
        session: Session,
        text: &str,
        first_contact: bool,
    ) -> Result<(Session, String), CaselineError> {
        let category = session
            .main_category
            .clone()
            .ok_or_else(|| CaselineError::Internal("collecting without a category".into()))?;

        let missing = self.missing_fields(&session, &category)?;
        if missing.is_empty() {
            return self.transition_ready(session, &category).await;
        }
        let current = missing[0];
        let current_name = current.name.clone();

        let outcome = self
            .extractor
            .extract(text, Some(current), &session.answers, &missing)
            .await;

        match outcome {
            ExtractionOutcome::Invalid { field, message } if !first_contact => {
                // No merge, no stage advance; the validator's message is
                // the reply, verbatim.
                debug!(session_id = %session.id, field = %field, "validation error surfaced");
                Ok((session, message))
            }
            ExtractionOutcome::Invalid { .. } | ExtractionOutcome::Empty { .. } => {
                if matches!(
                    outcome,
                    ExtractionOutcome::Empty {
                        method: ExtractionMethod::AiFailed
                    }
                ) {
                    warn!(session_id = %session.id, "extraction backend failed, re-asking");
                }
                let reply = self
                    .compose_question(&session, &category, &current_name, first_contact)?;
                let session = self.mark_asked(&session, &current_name).await?;
                Ok((session, reply))
            }
            ExtractionOutcome::FollowUp {
                values, question, ..
            } => {
                let session = self.merge(&session, values).await?;
                let session = self.mark_asked(&session, "last_name").await?;
                Ok((session, question))
            }
            ExtractionOutcome::Fields { values, method } => {
                debug!(
                    session_id = %session.id,
                    method = %method,
                    fields = values.len(),
                    "merging extracted fields"
                );
                let merged_current = values.contains_key(&current_name);
                let session = self.merge(&session, values).await?;

                let missing = self.missing_fields(&session, &category)?;
                let Some(next) = missing.first() else {
                    return self.transition_ready(session, &category).await;
                };

                if next.name == current_name && !merged_current {
                    // Same next field twice with no new information --
                    // flagged rather than silently repeated.
                    warn!(
                        session_id = %session.id,
                        field = %current_name,
                        "re-asking the same field without new information"
                    );
                }

                let next_name = next.name.clone();
                let reply =
                    self.compose_question(&session, &category, &next_name, first_contact)?;
                let session = self.mark_asked(&session, &next_name).await?;
                Ok((session, reply))
            }
        }
    }

    /// READY_TO_SUBMIT: an affirmative freezes the snapshot and enqueues.
    async fn handle_confirmation(
        &self,
        session: Session,
        text: &str,
    ) -> Result<(Session, String), CaselineError> {
        match validate::validate_yes_no(text).as_deref() {
            Ok("yes") => self.submit(session).await,
            Ok(_) => {
                let reply = "No problem -- nothing has been sent. Tell me what you'd \
                             like to change, or say \"yes\" when you're ready to submit."
                    .to_string();
                Ok((session, reply))
            }
            Err(_) => {
                let reply = "Just to confirm -- should I send your information to an \
                             attorney now? (yes or no)"
                    .to_string();
                Ok((session, reply))
            }
        }
    }

    async fn handle_post_submission(
        &self,
        session: Session,
    ) -> Result<(Session, String), CaselineError> {
        let reply = match session.lead_status {
            Some(LeadStatus::Sent) => {
                "Your information has been delivered. An attorney will be in touch soon."
            }
            Some(LeadStatus::Failed) => {
                "We hit a snag delivering your information, and our team is looking \
                 into it. You don't need to do anything else."
            }
            _ => "Your information has been submitted and is on its way to an attorney.",
        }
        .to_string();
        Ok((session, reply))
    }

    // --- Submission ---

    async fn submit(&self, session: Session) -> Result<(Session, String), CaselineError> {
        let main_category = session
            .main_category
            .clone()
            .ok_or_else(|| CaselineError::Internal("submitting without a category".into()))?;

        // Frozen snapshot: later session mutation cannot affect the job.
        let payload = LeadPayload {
            session_id: session.id.clone(),
            main_category,
            sub_category: session.sub_category.clone(),
            answers: session.answers.clone(),
            ip: session.ip.clone(),
            user_agent: session.user_agent.clone(),
            trusted_form_cert_url: session.trusted_form_cert_url.clone(),
            submitted_at: now_iso(),
        };
        let payload_json = serde_json::to_string(&payload)
            .map_err(|e| CaselineError::Internal(format!("lead snapshot serialization: {e}")))?;

        let job_id = self
            .store
            .enqueue(&self.queue_name, &session.id, &payload_json, self.max_attempts)
            .await?;
        info!(session_id = %session.id, job_id, "lead queued for delivery");

        let session = self
            .store
            .update_session(
                &session.id,
                SessionUpdate {
                    stage: Some(Stage::Submitted),
                    lead_status: Some(LeadStatus::Queued),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| CaselineError::Internal("session vanished during submission".into()))?;

        let first_name = session
            .answers
            .get("first_name")
            .map(|n| format!(", {n}"))
            .unwrap_or_default();
        let reply = format!(
            "Thank you{first_name}! Your information has been submitted. An attorney \
             who handles these cases will reach out to you shortly."
        );
        Ok((session, reply))
    }

    async fn transition_ready(
        &self,
        session: Session,
        category: &str,
    ) -> Result<(Session, String), CaselineError> {
        let session = self
            .store
            .update_session(
                &session.id,
                SessionUpdate {
                    stage: Some(Stage::ReadyToSubmit),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| CaselineError::Internal("session vanished before submission".into()))?;

        let label = self.schema.label(category).unwrap_or(category).to_string();
        let first_name = session
            .answers
            .get("first_name")
            .map(|n| format!(", {n}"))
            .unwrap_or_default();
        let reply = format!(
            "Thanks{first_name} -- that's everything I need. Say \"yes\" and I'll send \
             your information to an attorney who handles {label} cases."
        );
        Ok((session, reply))
    }

    // --- Helpers ---

    fn missing_fields<'a>(
        &'a self,
        session: &Session,
        category: &str,
    ) -> Result<Vec<&'a FieldDef>, CaselineError> {
        Ok(self
            .schema
            .askable_fields(category)?
            .into_iter()
            .filter(|f| {
                !session
                    .answers
                    .get(&f.name)
                    .is_some_and(|v| !v.is_empty())
            })
            .collect())
    }

    fn compose_question(
        &self,
        session: &Session,
        category: &str,
        field_name: &str,
        first_contact: bool,
    ) -> Result<String, CaselineError> {
        let question = self.schema.question(
            category,
            field_name,
            session.sub_category.as_deref(),
            &session.answers,
        )?;
        // The compassionate intro leads the very first question only.
        if first_contact && session.asked_fields.is_empty()
            && let Some(intro) = self.schema.intro(category)
        {
            return Ok(format!("{intro} {question}"));
        }
        Ok(question)
    }

    async fn merge(
        &self,
        session: &Session,
        values: AnswerMap,
    ) -> Result<Session, CaselineError> {
        let stage = if session.stage == Stage::Categorized {
            Some(Stage::Collecting)
        } else {
            None
        };
        self.store
            .update_session(
                &session.id,
                SessionUpdate {
                    stage,
                    answers: Some(values),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| CaselineError::Internal("session vanished during merge".into()))
    }

    async fn mark_asked(
        &self,
        session: &Session,
        field_name: &str,
    ) -> Result<Session, CaselineError> {
        let stage = if session.stage == Stage::Categorized {
            Some(Stage::Collecting)
        } else {
            None
        };
        self.store
            .update_session(
                &session.id,
                SessionUpdate {
                    stage,
                    asked_fields: Some(vec![field_name.to_string()]),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| CaselineError::Internal("session vanished while asking".into()))
    }

    async fn classify_with_model(&self, text: &str) -> Option<(String, Option<String>)> {
        let provider = self.provider.as_ref()?;
        let categories: Vec<(String, String)> = self
            .schema
            .categories()
            .map(|id| {
                (
                    id.to_string(),
                    self.schema.label(id).unwrap_or(id).to_string(),
                )
            })
            .collect();
        let prompt = ai::build_categorize_prompt(text, &categories);
        let response = match provider
            .complete(ModelRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("category classification failed: {e}");
                return None;
            }
        };
        let known: Vec<String> = categories.into_iter().map(|(id, _)| id).collect();
        ai::parse_category(&response.text, &known).map(|main| (main, None))
    }

    async fn record(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), CaselineError> {
        self.store
            .append_transcript(&TranscriptEntry {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                role: role.to_string(),
                content: content.to_string(),
                created_at: now_iso(),
            })
            .await
    }
}
