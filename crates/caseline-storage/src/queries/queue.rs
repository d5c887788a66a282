// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead queue operations for crash-safe delivery.
//!
//! Jobs move queued -> processing -> completed | queued (retry) |
//! dead_letter. Dequeue is a single atomic find-and-claim transaction;
//! `processing` rows carry a visibility timeout so a crashed worker's
//! claims become reclaimable instead of stuck.

use std::str::FromStr;
use std::time::Duration;

use caseline_core::types::now_iso;
use caseline_core::{CaselineError, JobStatus, LeadJob};
use rusqlite::params;

use crate::database::Database;

const JOB_COLUMNS: &str = "id, queue_name, session_id, payload, status, attempts, max_attempts,
     error, vendor_lead_id, locked_until, created_at, updated_at";

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<LeadJob, rusqlite::Error> {
    let status_text: String = row.get(4)?;
    let status = JobStatus::from_str(&status_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LeadJob {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        session_id: row.get(2)?,
        payload: row.get(3)?,
        status,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        error: row.get(7)?,
        vendor_lead_id: row.get(8)?,
        locked_until: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn iso_after(delta: Duration) -> String {
    (chrono::Utc::now() + chrono::Duration::from_std(delta).unwrap_or_default())
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Enqueue a new job. Returns the auto-generated job ID.
pub async fn enqueue(
    db: &Database,
    queue_name: &str,
    session_id: &str,
    payload: &str,
    max_attempts: i32,
) -> Result<i64, CaselineError> {
    let queue_name = queue_name.to_string();
    let session_id = session_id.to_string();
    let payload = payload.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO lead_jobs (queue_name, session_id, payload, status, attempts,
                     max_attempts, queued_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'queued', 0, ?4, ?5, ?5, ?5)",
                params![queue_name, session_id, payload, max_attempts, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Dequeue the next queued job from the named queue.
///
/// Atomically selects the oldest queued job (FIFO by requeue time) and
/// marks it `processing` under the given visibility timeout. Returns
/// `None` if the queue is empty.
pub async fn dequeue(
    db: &Database,
    queue_name: &str,
    visibility_timeout: Duration,
) -> Result<Option<LeadJob>, CaselineError> {
    let queue_name = queue_name.to_string();
    let now = now_iso();
    let locked_until = iso_after(visibility_timeout);
    db.connection()
        .call(move |conn| {
            // Transaction to atomically find + claim the next queued job.
            let tx = conn.transaction()?;

            let result = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM lead_jobs
                     WHERE queue_name = ?1 AND status = 'queued'
                     ORDER BY queued_at ASC, id ASC
                     LIMIT 1"
                ))?;
                stmt.query_row(params![queue_name], row_to_job)
            };

            match result {
                Ok(job) => {
                    tx.execute(
                        "UPDATE lead_jobs SET status = 'processing', locked_until = ?1,
                             updated_at = ?2
                         WHERE id = ?3",
                        params![locked_until, now, job.id],
                    )?;
                    tx.commit()?;
                    Ok(Some(LeadJob {
                        status: JobStatus::Processing,
                        locked_until: Some(locked_until),
                        ..job
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    tx.commit()?;
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Acknowledge successful delivery: job -> completed, vendor id recorded.
/// Completed jobs are retained for audit, not deleted.
pub async fn ack(
    db: &Database,
    id: i64,
    vendor_lead_id: Option<&str>,
) -> Result<(), CaselineError> {
    let vendor_lead_id = vendor_lead_id.map(str::to_string);
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE lead_jobs SET status = 'completed', vendor_lead_id = ?1,
                     locked_until = NULL, error = NULL, updated_at = ?2
                 WHERE id = ?3",
                params![vendor_lead_id, now, id],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record a failed delivery attempt.
///
/// Increments `attempts`. Transient failures re-append to the queue tail
/// until `max_attempts`, then dead-letter; a permanent failure
/// dead-letters immediately. Returns the job's resulting status.
pub async fn fail(
    db: &Database,
    id: i64,
    error: &str,
    permanent: bool,
) -> Result<JobStatus, CaselineError> {
    let error = error.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let (attempts, max_attempts): (i32, i32) = conn.query_row(
                "SELECT attempts, max_attempts FROM lead_jobs WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let new_attempts = attempts + 1;
            let status = if permanent || new_attempts >= max_attempts {
                JobStatus::DeadLetter
            } else {
                JobStatus::Queued
            };

            // Re-queueing bumps queued_at so the retry lands at the tail.
            conn.execute(
                "UPDATE lead_jobs SET status = ?1, attempts = ?2, error = ?3,
                     locked_until = NULL, queued_at = ?4, updated_at = ?4
                 WHERE id = ?5",
                params![status.to_string(), new_attempts, error, now, id],
            )?;
            Ok(status)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Return expired `processing` jobs to `queued` without charging an
/// attempt. A crashed worker is not a vendor failure.
pub async fn reclaim_expired(db: &Database, queue_name: &str) -> Result<usize, CaselineError> {
    let queue_name = queue_name.to_string();
    let now = now_iso();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE lead_jobs SET status = 'queued', locked_until = NULL,
                     queued_at = ?1, updated_at = ?1
                 WHERE queue_name = ?2 AND status = 'processing' AND locked_until <= ?1",
                params![now, queue_name],
            )?;
            Ok(n)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch one job by id.
pub async fn get_job(db: &Database, id: i64) -> Result<Option<LeadJob>, CaselineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM lead_jobs WHERE id = ?1"))?;
            match stmt.query_row(params![id], row_to_job) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List jobs in a queue, optionally filtered by status, oldest first.
pub async fn list_jobs(
    db: &Database,
    queue_name: &str,
    status: Option<JobStatus>,
) -> Result<Vec<LeadJob>, CaselineError> {
    let queue_name = queue_name.to_string();
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut jobs = Vec::new();
            match &status {
                Some(status_filter) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {JOB_COLUMNS} FROM lead_jobs
                         WHERE queue_name = ?1 AND status = ?2 ORDER BY id ASC"
                    ))?;
                    let rows = stmt.query_map(params![queue_name, status_filter], row_to_job)?;
                    for row in rows {
                        jobs.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {JOB_COLUMNS} FROM lead_jobs
                         WHERE queue_name = ?1 ORDER BY id ASC"
                    ))?;
                    let rows = stmt.query_map(params![queue_name], row_to_job)?;
                    for row in rows {
                        jobs.push(row?);
                    }
                }
            }
            Ok(jobs)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VIS: Duration = Duration::from_secs(300);

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn enqueue_and_dequeue_lifecycle() {
        let (db, _dir) = setup_db().await;

        let id = enqueue(&db, "lead-delivery", "sess-1", r#"{"phone":"x"}"#, 3)
            .await
            .unwrap();
        assert!(id > 0);

        let job = dequeue(&db, "lead-delivery", VIS).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.session_id, "sess-1");
        assert!(job.locked_until.is_some());

        // Queue should be empty now (no more queued).
        assert!(dequeue(&db, "lead-delivery", VIS).await.unwrap().is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_is_fifo() {
        let (db, _dir) = setup_db().await;
        let first = enqueue(&db, "q", "s1", "a", 3).await.unwrap();
        let second = enqueue(&db, "q", "s2", "b", 3).await.unwrap();

        assert_eq!(dequeue(&db, "q", VIS).await.unwrap().unwrap().id, first);
        assert_eq!(dequeue(&db, "q", VIS).await.unwrap().unwrap().id, second);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn ack_marks_completed_and_records_vendor_id() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "s", "payload", 3).await.unwrap();
        dequeue(&db, "q", VIS).await.unwrap().unwrap();

        ack(&db, id, Some("lp-lead-42")).await.unwrap();

        let job = get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.vendor_lead_id.as_deref(), Some("lp-lead-42"));
        assert!(job.locked_until.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_increments_attempts_and_requeues_at_tail() {
        let (db, _dir) = setup_db().await;
        let first = enqueue(&db, "q", "s1", "a", 3).await.unwrap();
        let second = enqueue(&db, "q", "s2", "b", 3).await.unwrap();

        dequeue(&db, "q", VIS).await.unwrap().unwrap();
        let status = fail(&db, first, "upstream 503", false).await.unwrap();
        assert_eq!(status, JobStatus::Queued);

        let job = get_job(&db, first).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.error.as_deref(), Some("upstream 503"));

        // The retried job went to the tail: the other job comes out first.
        assert_eq!(dequeue(&db, "q", VIS).await.unwrap().unwrap().id, second);
        assert_eq!(dequeue(&db, "q", VIS).await.unwrap().unwrap().id, first);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_dead_letters_at_max_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "s", "payload", 3).await.unwrap();

        for round in 1..=3 {
            let job = dequeue(&db, "q", VIS).await.unwrap().unwrap();
            assert_eq!(job.id, id);
            let status = fail(&db, id, "timeout", false).await.unwrap();
            if round < 3 {
                assert_eq!(status, JobStatus::Queued);
            } else {
                assert_eq!(status, JobStatus::DeadLetter);
            }
        }

        let job = get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::DeadLetter);
        assert_eq!(job.attempts, 3);

        // Dead-lettered jobs are never dequeued again.
        assert!(dequeue(&db, "q", VIS).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn permanent_failure_dead_letters_immediately() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "s", "payload", 3).await.unwrap();
        dequeue(&db, "q", VIS).await.unwrap().unwrap();

        let status = fail(&db, id, "400 bad payload", true).await.unwrap();
        assert_eq!(status, JobStatus::DeadLetter);

        let job = get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.attempts, 1);
        assert_eq!(job.status, JobStatus::DeadLetter);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reclaim_returns_expired_processing_to_queued() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "q", "s", "payload", 3).await.unwrap();

        // Claim with a zero-length visibility window: instantly expired.
        dequeue(&db, "q", Duration::ZERO).await.unwrap().unwrap();
        assert!(dequeue(&db, "q", VIS).await.unwrap().is_none());

        let reclaimed = reclaim_expired(&db, "q").await.unwrap();
        assert_eq!(reclaimed, 1);

        // Reclaim does not charge an attempt.
        let job = get_job(&db, id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 0);

        assert!(dequeue(&db, "q", VIS).await.unwrap().is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reclaim_leaves_live_claims_alone() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, "q", "s", "payload", 3).await.unwrap();
        dequeue(&db, "q", VIS).await.unwrap().unwrap();

        assert_eq!(reclaim_expired(&db, "q").await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_jobs_filters_by_status() {
        let (db, _dir) = setup_db().await;
        let a = enqueue(&db, "q", "s1", "a", 3).await.unwrap();
        enqueue(&db, "q", "s2", "b", 3).await.unwrap();

        dequeue(&db, "q", VIS).await.unwrap().unwrap();
        ack(&db, a, None).await.unwrap();

        let completed = list_jobs(&db, "q", Some(JobStatus::Completed)).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, a);

        let all = list_jobs(&db, "q", None).await.unwrap();
        assert_eq!(all.len(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_empty_queue_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(dequeue(&db, "nonexistent", VIS).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_no_sqlite_busy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("concurrent_test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();

        // Spawn 10 concurrent tasks all writing through the same Database.
        let mut handles = Vec::new();
        for i in 0..10 {
            let db = db.clone();
            let handle = tokio::spawn(async move {
                enqueue(&db, &format!("q-{i}"), "s", &format!(r#"{{"n":{i}}}"#), 3).await
            });
            handles.push(handle);
        }

        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "concurrent write failed: {result:?}");
        }

        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row("SELECT COUNT(*) FROM lead_jobs", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 10);

        db.close().await.unwrap();
    }
}
