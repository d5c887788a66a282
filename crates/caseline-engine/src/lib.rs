// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine for the Caseline intake funnel.
//!
//! [`IntakeEngine`] drives one visitor conversation from first contact to
//! lead handoff: it detects the practice area, walks the schema's required
//! fields, merges validated extractions into the session, and enqueues a
//! frozen lead snapshot once the set is complete.

pub mod engine;

pub use engine::{EngineReply, IntakeEngine};
