// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API client for the extraction fallback.
//!
//! Implements [`caseline_core::ModelProvider`] over the non-streaming
//! Messages endpoint with authentication and transient-error retry.

pub mod client;
pub mod types;

pub use client::AnthropicClient;
