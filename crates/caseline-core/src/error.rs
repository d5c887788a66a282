// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Caseline intake engine.

use thiserror::Error;

/// The primary error type used across all Caseline crates.
#[derive(Debug, Error)]
pub enum CaselineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Practice-area schema errors (unknown category, malformed field definition).
    #[error("schema error: {0}")]
    Schema(String),

    /// Generative extraction backend errors (API failure, malformed output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Lead marketplace submission errors.
    ///
    /// `permanent` distinguishes 4xx rejections (retrying cannot change the
    /// outcome) from transient 5xx/network failures the queue may retry.
    #[error("vendor error: {message}")]
    Vendor {
        message: String,
        status: Option<u16>,
        permanent: bool,
    },

    /// Inbound channel errors (bind failure, malformed request plumbing).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CaselineError {
    /// True for vendor failures that must not be retried.
    pub fn is_permanent_vendor_failure(&self) -> bool {
        matches!(self, CaselineError::Vendor { permanent: true, .. })
    }
}
