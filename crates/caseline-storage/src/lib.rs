// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Caseline intake engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and typed
//! operations for sessions (TTL'd), conversation transcripts, and the
//! crash-safe lead delivery queue.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;
pub mod writer;

pub use database::Database;
pub use store::SqliteStore;
