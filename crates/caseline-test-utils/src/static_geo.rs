// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-table geocoding fixture.

use std::collections::HashMap;

use async_trait::async_trait;

use caseline_core::{GeoLookup, ZipPlace};

/// A geocoder backed by a fixed ZIP table; unknown ZIPs return `None`,
/// matching the best-effort contract of the real collaborator.
pub struct StaticGeo {
    places: HashMap<String, ZipPlace>,
}

impl StaticGeo {
    /// A geocoder that knows nothing (simulates enrichment outage).
    pub fn empty() -> Self {
        Self {
            places: HashMap::new(),
        }
    }

    /// A geocoder that knows exactly one ZIP.
    pub fn with_place(zip: &str, place: ZipPlace) -> Self {
        let mut places = HashMap::new();
        places.insert(zip.to_string(), place);
        Self { places }
    }
}

#[async_trait]
impl GeoLookup for StaticGeo {
    async fn lookup(&self, zip: &str) -> Option<ZipPlace> {
        self.places.get(zip).cloned()
    }
}
