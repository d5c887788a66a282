// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lead delivery worker for the Caseline intake pipeline.
//!
//! Decouples "lead ready to submit" from "lead delivered to the vendor":
//! a poll loop pulls jobs from the durable queue in fixed-size batches,
//! posts each lead through the submission client, and records the outcome
//! on both the job and the originating session. Shutdown is cooperative --
//! a cancellation token observed between work units, with a bounded drain.

pub mod shutdown;
pub mod worker;

pub use shutdown::install_signal_handler;
pub use worker::{QueueWorker, WorkerSettings};
