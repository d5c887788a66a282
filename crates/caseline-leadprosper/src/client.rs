// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for LeadProsper lead submission.
//!
//! POSTs mapped leads to `/direct_post` with bearer auth. Transient
//! failures (5xx, timeout, network) retry with exponential backoff; 4xx
//! client errors return immediately as permanent -- retrying a malformed
//! request wastes quota without changing the outcome. Every attempt and
//! response is logged for audit.

use std::time::Duration;

use caseline_core::{CaselineError, LeadPayload};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::payload::build_vendor_payload;

/// Base delay for exponential backoff; doubles each retry, capped.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    /// Vendor-assigned lead identifier, when the response carried one.
    pub lead_id: Option<String>,
    /// HTTP status of the accepting response.
    pub status_code: u16,
}

#[derive(Debug, Deserialize)]
struct VendorResponse {
    #[serde(default)]
    lead_id: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// LeadProsper submission client.
#[derive(Debug, Clone)]
pub struct LeadProsperClient {
    client: reqwest::Client,
    api_url: String,
    campaign_id: Option<String>,
    max_retries: u32,
}

impl LeadProsperClient {
    /// Create a client posting to `{api_url}/direct_post`.
    pub fn new(
        api_url: String,
        api_key: String,
        campaign_id: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, CaselineError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {api_key}");
        headers.insert(
            "authorization",
            HeaderValue::from_str(&bearer)
                .map_err(|e| CaselineError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| CaselineError::Vendor {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                permanent: true,
            })?;

        Ok(Self {
            client,
            api_url,
            campaign_id,
            max_retries,
        })
    }

    /// Submit one lead.
    ///
    /// Errors carry the `permanent` flag the queue uses to decide between
    /// requeue and immediate dead-letter.
    pub async fn submit(&self, lead: &LeadPayload) -> Result<SubmissionResult, CaselineError> {
        let body = build_vendor_payload(lead, self.campaign_id.as_deref());
        let url = format!("{}/direct_post", self.api_url.trim_end_matches('/'));

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = BACKOFF_CAP.min(BACKOFF_BASE * 2u32.saturating_pow(attempt - 1));
                warn!(
                    session_id = %lead.session_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying lead submission after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(session_id = %lead.session_id, attempt, "posting lead to vendor");
            let response = match self.client.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    // Timeout and connection errors are transient by
                    // definition; the queue layer retries on top of this.
                    warn!(session_id = %lead.session_id, attempt, error = %e, "vendor request failed");
                    last_error = Some(CaselineError::Vendor {
                        message: format!("vendor request failed: {e}"),
                        status: None,
                        permanent: false,
                    });
                    continue;
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            info!(
                session_id = %lead.session_id,
                attempt,
                status = status.as_u16(),
                body = %text,
                "vendor response"
            );

            if status.is_success() {
                let lead_id = serde_json::from_str::<VendorResponse>(&text)
                    .ok()
                    .and_then(|r| r.lead_id.or(r.id))
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    });
                return Ok(SubmissionResult {
                    lead_id,
                    status_code: status.as_u16(),
                });
            }

            if status.is_client_error() {
                // Bad payload, auth, or campaign config. Retrying cannot fix it.
                return Err(CaselineError::Vendor {
                    message: format!("vendor rejected lead ({status}): {text}"),
                    status: Some(status.as_u16()),
                    permanent: true,
                });
            }

            last_error = Some(CaselineError::Vendor {
                message: format!("vendor error ({status}): {text}"),
                status: Some(status.as_u16()),
                permanent: false,
            });
        }

        Err(last_error.unwrap_or_else(|| CaselineError::Vendor {
            message: "lead submission failed after retries".into(),
            status: None,
            permanent: false,
        }))
    }
}
