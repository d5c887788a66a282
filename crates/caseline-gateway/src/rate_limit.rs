// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window per-IP rate limiting.
//!
//! Gates requests before they reach the conversation core, which stays
//! unaware of it. The limiter hides behind the [`RateLimit`] trait: the
//! production deployment keeps the window in the shared store so the limit
//! holds across gateway instances, while [`MemoryRateLimiter`] backs tests
//! and single-process setups with an in-process map.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use tracing::debug;

use crate::handlers::ErrorResponse;
use crate::server::GatewayState;

/// Per-key request gate consulted before every v1 request.
#[async_trait]
pub trait RateLimit: Send + Sync + 'static {
    /// Record a hit for `key`. Returns whether the request is allowed.
    async fn allow(&self, key: &str) -> bool;
}

struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed-window counter keyed by client IP.
pub struct MemoryRateLimiter {
    windows: DashMap<String, Window>,
    limit: u32,
    window: Duration,
}

impl MemoryRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    /// Record a hit for `key`. Returns whether the request is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        entry.count <= self.limit
    }
}

#[async_trait]
impl RateLimit for MemoryRateLimiter {
    async fn allow(&self, key: &str) -> bool {
        self.check(key)
    }
}

/// Middleware applying the limiter to every request it wraps.
pub async fn rate_limit_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let ip = client_ip(request.headers(), peer);
    if !state.limiter.allow(&ip).await {
        debug!(ip = %ip, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "rate limit exceeded, please slow down".to_string(),
            }),
        )
            .into_response();
    }
    next.run(request).await
}

/// Client IP for rate limiting and session metadata: the first
/// `X-Forwarded-For` hop when present (the gateway sits behind a proxy in
/// production), otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_up_to_limit_per_window() {
        let limiter = MemoryRateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        // Another key has its own window.
        assert!(limiter.check("10.0.0.2"));
    }

    #[test]
    fn window_resets_after_elapsing() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_millis(30));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "198.51.100.7, 10.0.0.1".parse().unwrap(),
        );
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "198.51.100.7");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }
}
