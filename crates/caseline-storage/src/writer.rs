// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-writer doctrine for the intake store.
//!
//! Every mutation -- session merge, transcript append, queue claim, rate
//! window bump -- goes through the one `tokio_rusqlite::Connection` held by
//! [`crate::Database`]. That serialization is what makes the queue's
//! find-and-claim and the session's read-apply-write single atomic steps:
//! two workers can never claim the same job, and two gateway requests can
//! never interleave halves of a session merge.
//!
//! **Do NOT open a second `Connection` to the same database file for
//! writes.** A separate connection would bypass the writer thread and
//! reintroduce both SQLITE_BUSY failures and the read-modify-write races
//! the query modules are shaped to avoid.
