// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Caseline workspace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ordered map of field name to validated answer value.
///
/// BTreeMap keeps serialization deterministic, which the engine relies on
/// when diffing answer sets before and after a merge.
pub type AnswerMap = BTreeMap<String, String>;

/// Position of a conversation in the intake funnel.
///
/// Transitions are strictly forward (`init` -> `categorized` -> `collecting`
/// -> `ready_to_submit` -> `submitted`); the only backward move is an
/// explicit reset to `init`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Categorized,
    Collecting,
    ReadyToSubmit,
    Submitted,
}

impl Stage {
    /// Whether moving from `self` to `next` respects the forward-only order.
    ///
    /// Staying on the same stage is always allowed; `Init` as a target is
    /// reserved for the explicit reset operation and rejected here.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Stage::Init, Stage::Categorized)
                | (Stage::Init, Stage::Collecting)
                | (Stage::Categorized, Stage::Collecting)
                | (Stage::Categorized, Stage::ReadyToSubmit)
                | (Stage::Collecting, Stage::ReadyToSubmit)
                | (Stage::ReadyToSubmit, Stage::Submitted)
        )
    }
}

/// Delivery status of a session's lead, set only after a submission attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Queued,
    Sent,
    Failed,
}

/// One visitor conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique id, immutable after creation.
    pub id: String,
    pub stage: Stage,
    /// Frozen once category detection succeeds; never re-detected.
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    /// Field name -> validated value. A merge never replaces a non-empty
    /// value with an empty one.
    pub answers: AnswerMap,
    /// Fields already presented as a question, in ask order.
    pub asked_fields: Vec<String>,
    pub ip: String,
    pub user_agent: String,
    /// Opaque TCPA/compliance token captured at session creation and passed
    /// through to the vendor untouched.
    pub trusted_form_cert_url: Option<String>,
    pub lead_status: Option<LeadStatus>,
    /// ISO 8601 timestamps stored as text.
    pub created_at: String,
    pub updated_at: String,
    /// TTL boundary; sessions past this read as absent.
    pub expires_at: String,
}

/// Partial session mutation applied by `LeadStore::update_session`.
///
/// `None` fields are left untouched; the store refreshes `updated_at` and
/// `expires_at` on every update.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub stage: Option<Stage>,
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    pub answers: Option<AnswerMap>,
    pub asked_fields: Option<Vec<String>>,
    pub lead_status: Option<LeadStatus>,
}

/// A single turn in the conversation audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub session_id: String,
    /// "user", "assistant", or "system" (pipeline-authored entries).
    pub role: String,
    pub content: String,
    pub created_at: String,
}

/// Lifecycle state of a lead delivery job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    DeadLetter,
}

/// One lead delivery job, derived from a session at READY_TO_SUBMIT.
#[derive(Debug, Clone)]
pub struct LeadJob {
    pub id: i64,
    pub queue_name: String,
    /// Weak back-reference; the queue does not own the session lifecycle.
    pub session_id: String,
    /// Frozen JSON snapshot of a [`LeadPayload`]. Later session mutation
    /// cannot affect an in-flight job.
    pub payload: String,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Last failure message, if any.
    pub error: Option<String>,
    /// Vendor-assigned lead identifier, set on successful delivery.
    pub vendor_lead_id: Option<String>,
    /// Visibility timeout while `processing`; expired locks are reclaimed.
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The frozen lead snapshot serialized into a job payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadPayload {
    pub session_id: String,
    pub main_category: String,
    pub sub_category: Option<String>,
    pub answers: AnswerMap,
    pub ip: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_form_cert_url: Option<String>,
    pub submitted_at: String,
}

/// Request metadata captured at the inbound edge and stored on the session.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
    pub trusted_form_cert_url: Option<String>,
}

/// Current server time in the ISO 8601 format used throughout storage.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn stage_round_trips_through_strings() {
        for stage in [
            Stage::Init,
            Stage::Categorized,
            Stage::Collecting,
            Stage::ReadyToSubmit,
            Stage::Submitted,
        ] {
            let s = stage.to_string();
            assert_eq!(Stage::from_str(&s).unwrap(), stage);
        }
        assert_eq!(Stage::ReadyToSubmit.to_string(), "ready_to_submit");
    }

    #[test]
    fn stage_progression_is_forward_only() {
        assert!(Stage::Init.can_advance_to(Stage::Categorized));
        assert!(Stage::Categorized.can_advance_to(Stage::Collecting));
        assert!(Stage::Collecting.can_advance_to(Stage::ReadyToSubmit));
        assert!(Stage::ReadyToSubmit.can_advance_to(Stage::Submitted));

        // No skipping past ready_to_submit, no reversals.
        assert!(!Stage::Collecting.can_advance_to(Stage::Submitted));
        assert!(!Stage::Submitted.can_advance_to(Stage::Collecting));
        assert!(!Stage::Categorized.can_advance_to(Stage::Init));
    }

    #[test]
    fn same_stage_is_allowed() {
        assert!(Stage::Collecting.can_advance_to(Stage::Collecting));
    }

    #[test]
    fn job_status_round_trips() {
        assert_eq!(JobStatus::DeadLetter.to_string(), "dead_letter");
        assert_eq!(
            JobStatus::from_str("processing").unwrap(),
            JobStatus::Processing
        );
    }

    #[test]
    fn lead_payload_serializes_without_null_cert() {
        let payload = LeadPayload {
            session_id: "s1".into(),
            main_category: "personal_injury".into(),
            sub_category: Some("car accident".into()),
            answers: AnswerMap::new(),
            ip: "10.0.0.1".into(),
            user_agent: "test".into(),
            trusted_form_cert_url: None,
            submitted_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("trusted_form_cert_url"));
    }
}
