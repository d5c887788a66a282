// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LeadProsper submission client.
//!
//! Maps completed leads to the vendor wire format and delivers them with
//! bounded exponential-backoff retry on transient failures only.

pub mod client;
pub mod payload;

pub use client::{LeadProsperClient, SubmissionResult};
pub use payload::build_vendor_payload;
