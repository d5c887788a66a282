// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits implemented by the pluggable backends.

pub mod geo;
pub mod provider;
pub mod store;

pub use geo::{GeoLookup, ZipPlace};
pub use provider::{ModelProvider, ModelRequest, ModelResponse};
pub use store::LeadStore;
