// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Caseline intake engine.
//!
//! Provides the shared error type, domain types (sessions, lead jobs,
//! transcripts), and the adapter traits the pipeline is wired through:
//! [`LeadStore`], [`ModelProvider`], and [`GeoLookup`].

pub mod error;
pub mod traits;
pub mod types;

pub use error::CaselineError;
pub use traits::{GeoLookup, LeadStore, ModelProvider, ModelRequest, ModelResponse, ZipPlace};
pub use types::{
    AnswerMap, ClientMeta, JobStatus, LeadJob, LeadPayload, LeadStatus, Session, SessionUpdate,
    Stage, TranscriptEntry,
};
