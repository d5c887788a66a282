// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Geocoding collaborator trait for ZIP enrichment.

use async_trait::async_trait;

/// City/state pair resolved from a ZIP code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipPlace {
    pub city: String,
    pub state: String,
}

/// ZIP -> city/state lookup.
///
/// Enrichment is best-effort: implementations return `None` on any failure
/// (network, decode, unknown ZIP) and never error. A ZIP answer is accepted
/// whether or not enrichment succeeds.
#[async_trait]
pub trait GeoLookup: Send + Sync + 'static {
    async fn lookup(&self, zip: &str) -> Option<ZipPlace>;
}
