// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The batch delivery loop.
//!
//! Jobs move queued -> processing -> completed | queued (retry) |
//! dead_letter; the attempt ceiling lives in the queue, transport backoff
//! lives in the submission client. Each scheduler round reclaims expired
//! claims, then drains the queue in fixed-size concurrent batches until a
//! short batch signals exhaustion.

use std::sync::Arc;
use std::time::Duration;

use caseline_core::types::now_iso;
use caseline_core::{
    CaselineError, JobStatus, LeadJob, LeadPayload, LeadStatus, LeadStore, SessionUpdate,
    TranscriptEntry,
};
use caseline_leadprosper::LeadProsperClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Tuning knobs for the worker loop, mirroring `WorkerConfig` from
/// caseline-config.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub queue_name: String,
    /// Jobs pulled per batch; a batch's jobs run concurrently.
    pub batch_size: usize,
    /// Sleep between polling rounds when the queue is idle.
    pub poll_interval: Duration,
    /// How long a `processing` claim holds before it is reclaimable.
    pub visibility_timeout: Duration,
    /// Bound on waiting for the in-flight cycle after shutdown is requested.
    pub drain_timeout: Duration,
}

/// Queue worker delivering completed leads to the vendor.
pub struct QueueWorker {
    store: Arc<dyn LeadStore>,
    client: LeadProsperClient,
    settings: WorkerSettings,
}

impl QueueWorker {
    pub fn new(
        store: Arc<dyn LeadStore>,
        client: LeadProsperClient,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    /// Resident poll loop.
    ///
    /// Observes `cancel` between work units; when shutdown is requested
    /// mid-cycle, the in-flight batch gets up to the drain timeout to
    /// finish, after which its claims are left to the visibility timeout.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            queue = %self.settings.queue_name,
            batch_size = self.settings.batch_size,
            "lead delivery worker started"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let cycle = self.process_available();
            tokio::pin!(cycle);
            let outcome = tokio::select! {
                result = &mut cycle => result,
                _ = cancel.cancelled() => {
                    match tokio::time::timeout(self.settings.drain_timeout, &mut cycle).await {
                        Ok(Ok(n)) => debug!(processed = n, "drained in-flight cycle"),
                        Ok(Err(e)) => warn!(error = %e, "in-flight cycle failed during drain"),
                        Err(_) => warn!(
                            "drain timeout elapsed; in-flight claims fall back to the \
                             visibility timeout"
                        ),
                    }
                    break;
                }
            };

            let idle = match outcome {
                Ok(0) => true,
                Ok(n) => {
                    debug!(processed = n, "delivery cycle complete");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "delivery cycle failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
        info!("lead delivery worker stopped");
    }

    /// One scheduler invocation: reclaim expired claims, then drain the
    /// queue in batches. Returns the number of jobs processed.
    ///
    /// Public so hosts without a resident process (cron, one-shot
    /// invocations) can drive delivery without the poll loop.
    pub async fn process_available(&self) -> Result<usize, CaselineError> {
        let reclaimed = self.store.reclaim_expired(&self.settings.queue_name).await?;
        if reclaimed > 0 {
            info!(reclaimed, "returned expired processing claims to the queue");
        }

        let mut total = 0;
        loop {
            let batch = self.pull_batch().await?;
            if batch.is_empty() {
                break;
            }
            // A short batch signals the queue is exhausted for this round;
            // it also breaks the tight loop on a job that keeps failing.
            let short = batch.len() < self.settings.batch_size;
            total += batch.len();
            futures::future::join_all(batch.into_iter().map(|job| self.process_job(job))).await;
            if short {
                break;
            }
        }
        Ok(total)
    }

    async fn pull_batch(&self) -> Result<Vec<LeadJob>, CaselineError> {
        let mut jobs = Vec::with_capacity(self.settings.batch_size);
        while jobs.len() < self.settings.batch_size {
            match self
                .store
                .dequeue(&self.settings.queue_name, self.settings.visibility_timeout)
                .await?
            {
                Some(job) => jobs.push(job),
                None => break,
            }
        }
        Ok(jobs)
    }

    /// Deliver one job. Outcomes are recorded on the job and the session;
    /// a bad job never stalls the rest of the batch.
    async fn process_job(&self, job: LeadJob) {
        let payload: LeadPayload = match serde_json::from_str(&job.payload) {
            Ok(payload) => payload,
            Err(e) => {
                // A snapshot that does not parse can never deliver.
                self.record_failure(&job, &format!("malformed lead snapshot: {e}"), true)
                    .await;
                return;
            }
        };

        debug!(
            job_id = job.id,
            session_id = %job.session_id,
            attempt = job.attempts + 1,
            "delivering lead"
        );
        match self.client.submit(&payload).await {
            Ok(result) => {
                if let Err(e) = self.store.ack(job.id, result.lead_id.as_deref()).await {
                    error!(job_id = job.id, error = %e, "failed to record completed job");
                    return;
                }
                let reference = result.lead_id.as_deref().unwrap_or("unknown");
                self.write_session_status(
                    &job.session_id,
                    LeadStatus::Sent,
                    &format!("Lead delivered to the attorney network (reference {reference})."),
                )
                .await;
                info!(
                    job_id = job.id,
                    session_id = %job.session_id,
                    vendor_lead_id = reference,
                    status = result.status_code,
                    "lead delivered"
                );
            }
            Err(e) => {
                let permanent = e.is_permanent_vendor_failure();
                self.record_failure(&job, &e.to_string(), permanent).await;
            }
        }
    }

    async fn record_failure(&self, job: &LeadJob, error: &str, permanent: bool) {
        match self.store.fail(job.id, error, permanent).await {
            Ok(JobStatus::DeadLetter) => {
                warn!(
                    job_id = job.id,
                    session_id = %job.session_id,
                    error,
                    "job dead-lettered"
                );
                self.write_session_status(
                    &job.session_id,
                    LeadStatus::Failed,
                    "Lead delivery failed after exhausting retries; flagged for manual \
                     follow-up.",
                )
                .await;
            }
            Ok(status) => {
                warn!(
                    job_id = job.id,
                    attempt = job.attempts + 1,
                    status = %status,
                    error,
                    "delivery failed, job requeued"
                );
            }
            Err(e) => error!(job_id = job.id, error = %e, "failed to record job failure"),
        }
    }

    /// Session writeback is best-effort: the job record is the source of
    /// truth, and an expired session must not change a delivery outcome.
    async fn write_session_status(&self, session_id: &str, status: LeadStatus, note: &str) {
        let update = SessionUpdate {
            lead_status: Some(status),
            ..Default::default()
        };
        match self.store.update_session(session_id, update).await {
            Ok(Some(_)) => {
                let entry = TranscriptEntry {
                    id: Uuid::new_v4().to_string(),
                    session_id: session_id.to_string(),
                    role: "system".to_string(),
                    content: note.to_string(),
                    created_at: now_iso(),
                };
                if let Err(e) = self.store.append_transcript(&entry).await {
                    warn!(session_id, error = %e, "failed to append delivery transcript entry");
                }
            }
            Ok(None) => debug!(session_id, "session expired before delivery writeback"),
            Err(e) => warn!(session_id, error = %e, "failed to update session lead status"),
        }
    }
}
