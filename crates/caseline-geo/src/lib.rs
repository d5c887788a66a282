// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ZIP -> city/state geocoding client.
//!
//! Wraps a Zippopotam-style HTTP API behind [`GeoLookup`]. Enrichment is
//! best-effort by contract: every failure mode (network, timeout, decode,
//! unknown ZIP) collapses to `None` and is logged, never raised.

use std::time::Duration;

use async_trait::async_trait;
use caseline_core::{CaselineError, GeoLookup, ZipPlace};
use serde::Deserialize;
use tracing::debug;

/// HTTP geocoding client.
#[derive(Debug, Clone)]
pub struct GeoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ZipResponse {
    places: Vec<PlaceRecord>,
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: String,
}

impl GeoClient {
    /// Create a client for the given base URL (e.g.
    /// `https://api.zippopotam.us/us`).
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, CaselineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaselineError::Channel {
                message: format!("failed to build geocoding HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl GeoLookup for GeoClient {
    async fn lookup(&self, zip: &str) -> Option<ZipPlace> {
        let url = format!("{}/{zip}", self.base_url.trim_end_matches('/'));
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(zip, error = %e, "geocoding request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(zip, status = %response.status(), "geocoding lookup miss");
            return None;
        }
        let body: ZipResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                debug!(zip, error = %e, "geocoding response decode failed");
                return None;
            }
        };
        body.places.first().map(|place| ZipPlace {
            city: place.place_name.clone(),
            state: place.state_abbreviation.clone(),
        })
    }
}
