// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Caseline integration tests.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests
//! without external services.
//!
//! # Components
//!
//! - [`MockModelProvider`] - Mock extraction backend with queued responses
//! - [`StaticGeo`] - Fixed-table geocoder

pub mod mock_provider;
pub mod static_geo;

pub use mock_provider::MockModelProvider;
pub use static_geo::StaticGeo;
