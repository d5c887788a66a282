// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound HTTP gateway for the Caseline intake engine.
//!
//! Serves the chat widget's only entry point (`POST /v1/intake/messages`),
//! an async status endpoint for submitted leads, and a public health
//! check. A fixed-window per-IP rate limiter and optional bearer auth sit
//! in front of the conversation core, which stays unaware of both.

pub mod auth;
pub mod handlers;
pub mod rate_limit;
pub mod server;

pub use auth::AuthConfig;
pub use rate_limit::{MemoryRateLimiter, RateLimit};
pub use server::{build_router, start_server, GatewayState, ServerConfig};
