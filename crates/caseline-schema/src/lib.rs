// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Practice-area field schema registry for the Caseline intake engine.
//!
//! Describes, per legal category, the ordered required fields, their type
//! tags and question templates, and the keyword rules for category
//! detection. Pure data access: the registry holds no conversation state.

pub mod registry;

pub use registry::{DetectionRule, FieldDef, FieldType, PracticeArea, SchemaRegistry};
