// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. All functions accept `&Database` and run through
//! the single background writer.

pub mod queue;
pub mod rate_limit;
pub mod sessions;
pub mod transcript;
