// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`LeadStore`] trait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use caseline_config::model::{SessionConfig, StorageConfig};
use caseline_core::{
    CaselineError, JobStatus, LeadJob, LeadStore, Session, SessionUpdate, TranscriptEntry,
};

use crate::database::Database;
use crate::queries;

/// Granularity of the bounded-wait dequeue poll.
const DEQUEUE_POLL_STEP: Duration = Duration::from_millis(100);

/// SQLite-backed lead store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
pub struct SqliteStore {
    db: Database,
    ttl_days: u32,
}

impl SqliteStore {
    /// Open the database at the configured path, running migrations.
    pub async fn open(
        storage: &StorageConfig,
        session: &SessionConfig,
    ) -> Result<Self, CaselineError> {
        let db =
            Database::open_with_journal(&storage.database_path, storage.wal_mode).await?;
        debug!(path = %storage.database_path, "SQLite lead store initialized");
        Ok(Self {
            db,
            ttl_days: session.ttl_days,
        })
    }

    /// Open a store at an explicit path (tests, ops tooling).
    pub async fn open_at(path: &str, ttl_days: u32) -> Result<Self, CaselineError> {
        let db = Database::open(path).await?;
        Ok(Self { db, ttl_days })
    }

    /// Checkpoint the WAL and release the connection.
    pub async fn close(&self) -> Result<(), CaselineError> {
        self.db.close().await
    }

    /// Record a rate-limit hit for `key`. Returns whether the request is
    /// allowed. The window lives in the shared store, so the limit holds
    /// across gateway instances.
    pub async fn rate_limit_hit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, CaselineError> {
        queries::rate_limit::hit(&self.db, key, limit, window).await
    }

    /// Delete rate-limit counters whose window has closed.
    pub async fn purge_stale_rate_windows(
        &self,
        window: Duration,
    ) -> Result<usize, CaselineError> {
        queries::rate_limit::purge_stale(&self.db, window).await
    }
}

#[async_trait]
impl LeadStore for SqliteStore {
    async fn create_session(
        &self,
        id: Option<String>,
        ip: &str,
        user_agent: &str,
        trusted_form_cert_url: Option<String>,
    ) -> Result<Session, CaselineError> {
        queries::sessions::create_session(
            &self.db,
            id,
            ip,
            user_agent,
            trusted_form_cert_url,
            self.ttl_days,
        )
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, CaselineError> {
        queries::sessions::get_session(&self.db, id).await
    }

    async fn update_session(
        &self,
        id: &str,
        update: SessionUpdate,
    ) -> Result<Option<Session>, CaselineError> {
        queries::sessions::update_session(&self.db, id, update, self.ttl_days).await
    }

    async fn reset_session(&self, id: &str) -> Result<Option<Session>, CaselineError> {
        queries::sessions::reset_session(&self.db, id, self.ttl_days).await
    }

    async fn purge_expired_sessions(&self) -> Result<usize, CaselineError> {
        queries::sessions::purge_expired(&self.db).await
    }

    async fn append_transcript(&self, entry: &TranscriptEntry) -> Result<(), CaselineError> {
        queries::transcript::append_entry(&self.db, entry).await
    }

    async fn get_transcript(
        &self,
        session_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<TranscriptEntry>, CaselineError> {
        queries::transcript::get_for_session(&self.db, session_id, limit).await
    }

    async fn enqueue(
        &self,
        queue_name: &str,
        session_id: &str,
        payload: &str,
        max_attempts: i32,
    ) -> Result<i64, CaselineError> {
        queries::queue::enqueue(&self.db, queue_name, session_id, payload, max_attempts).await
    }

    async fn dequeue(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
    ) -> Result<Option<LeadJob>, CaselineError> {
        queries::queue::dequeue(&self.db, queue_name, visibility_timeout).await
    }

    async fn dequeue_wait(
        &self,
        queue_name: &str,
        visibility_timeout: Duration,
        wait: Duration,
    ) -> Result<Option<LeadJob>, CaselineError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(job) =
                queries::queue::dequeue(&self.db, queue_name, visibility_timeout).await?
            {
                return Ok(Some(job));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(DEQUEUE_POLL_STEP.min(deadline - now)).await;
        }
    }

    async fn ack(&self, id: i64, vendor_lead_id: Option<&str>) -> Result<(), CaselineError> {
        queries::queue::ack(&self.db, id, vendor_lead_id).await
    }

    async fn fail(
        &self,
        id: i64,
        error: &str,
        permanent: bool,
    ) -> Result<JobStatus, CaselineError> {
        queries::queue::fail(&self.db, id, error, permanent).await
    }

    async fn reclaim_expired(&self, queue_name: &str) -> Result<usize, CaselineError> {
        queries::queue::reclaim_expired(&self.db, queue_name).await
    }

    async fn get_job(&self, id: i64) -> Result<Option<LeadJob>, CaselineError> {
        queries::queue::get_job(&self.db, id).await
    }

    async fn list_jobs(
        &self,
        queue_name: &str,
        status: Option<JobStatus>,
    ) -> Result<Vec<LeadJob>, CaselineError> {
        queries::queue::list_jobs(&self.db, queue_name, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");
        let store = SqliteStore::open_at(db_path.to_str().unwrap(), 7)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn full_session_lifecycle_through_store() {
        let (store, _dir) = open_store().await;

        let session = store
            .create_session(None, "10.0.0.1", "widget/1.0", None)
            .await
            .unwrap();

        let fetched = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);

        let entry = TranscriptEntry {
            id: "t1".into(),
            session_id: session.id.clone(),
            role: "user".into(),
            content: "hello".into(),
            created_at: caseline_core::types::now_iso(),
        };
        store.append_transcript(&entry).await.unwrap();
        let transcript = store.get_transcript(&session.id, None).await.unwrap();
        assert_eq!(transcript.len(), 1);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_wait_returns_early_when_job_arrives() {
        let (store, _dir) = open_store().await;
        store.enqueue("q", "s", "payload", 3).await.unwrap();

        let started = tokio::time::Instant::now();
        let job = store
            .dequeue_wait("q", Duration::from_secs(300), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(job.is_some());
        assert!(started.elapsed() < Duration::from_secs(1));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_wait_times_out_on_empty_queue() {
        let (store, _dir) = open_store().await;
        let job = store
            .dequeue_wait("q", Duration::from_secs(300), Duration::from_millis(250))
            .await
            .unwrap();
        assert!(job.is_none());
        store.close().await.unwrap();
    }
}
