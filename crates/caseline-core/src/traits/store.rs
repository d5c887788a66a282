// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage trait covering sessions, transcripts, and the lead queue.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CaselineError;
use crate::types::{JobStatus, LeadJob, Session, SessionUpdate, TranscriptEntry};

/// Persistence backend for the intake pipeline.
///
/// All operations are narrow mutate-and-return calls; callers never hold a
/// read-modify-write split across two round trips. Session reads treat
/// expired rows as absent.
#[async_trait]
pub trait LeadStore: Send + Sync + 'static {
    // --- Session operations ---

    /// Create a session. When `id` is `None` the store mints a uuid; a
    /// caller-supplied id is used verbatim (the client owns continuity).
    async fn create_session(
        &self,
        id: Option<String>,
        ip: &str,
        user_agent: &str,
        trusted_form_cert_url: Option<String>,
    ) -> Result<Session, CaselineError>;

    /// Fetch an unexpired session, or `None`.
    async fn get_session(&self, id: &str) -> Result<Option<Session>, CaselineError>;

    /// Merge `update` into the session, refreshing `updated_at` and the TTL.
    /// Returns the updated session, or `None` if it does not exist.
    async fn update_session(
        &self,
        id: &str,
        update: SessionUpdate,
    ) -> Result<Option<Session>, CaselineError>;

    /// Reset a session to `init`, clearing category, answers, and history.
    async fn reset_session(&self, id: &str) -> Result<Option<Session>, CaselineError>;

    /// Delete sessions past their TTL. Returns the number removed.
    async fn purge_expired_sessions(&self) -> Result<usize, CaselineError>;

    // --- Transcript operations ---

    async fn append_transcript(&self, entry: &TranscriptEntry) -> Result<(), CaselineError>;

    async fn get_transcript(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<TranscriptEntry>, CaselineError>;

    // --- Lead queue operations ---

    /// Append a job to the named queue. Returns the job id.
    async fn enqueue(
        &self,
        queue_name: &str,
        session_id: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, CaselineError>;

    /// Atomically move the oldest queued job to `processing` under a
    /// visibility timeout. `None` when the queue is empty.
    async fn dequeue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<LeadJob>, CaselineError>;

    /// Bounded-wait dequeue: polls until a job arrives or `wait` elapses.
    async fn dequeue_wait(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Option<LeadJob>, CaselineError>;

    /// Mark a job completed, recording the vendor-assigned lead id.
    async fn ack(&self, id: i64, vendor_lead_id: Option<&str>) -> Result<(), CaselineError>;

    /// Record a failure. Transient failures re-queue until `max_attempts`,
    /// then dead-letter; `permanent` dead-letters immediately.
    /// Returns the job's resulting status.
    async fn fail(
        &self,
        id: i64,
        error: &str,
        permanent: bool,
    ) -> Result<JobStatus, CaselineError>;

    /// Return expired `processing` jobs to `queued` without charging an
    /// attempt. Returns the number reclaimed.
    async fn reclaim_expired(&self, queue_name: &str) -> Result<usize, CaselineError>;

    async fn get_job(&self, id: i64) -> Result<Option<LeadJob>, CaselineError>;

    async fn list_jobs(
        &self,
        queue_name: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<LeadJob>, CaselineError>;
}
