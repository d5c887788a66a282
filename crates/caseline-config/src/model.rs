// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Caseline intake engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Caseline configuration.
///
/// Loaded once at process start from TOML files following the XDG
/// hierarchy, with environment variable overrides. All sections are
/// optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CaselineConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings for the extraction fallback.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Practice-area schema settings.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Inbound HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// LeadProsper submission settings.
    #[serde(default)]
    pub leadprosper: LeadProsperConfig,

    /// ZIP geocoding settings.
    #[serde(default)]
    pub geo: GeoConfig,

    /// Lead queue worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in log output.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "caseline".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Anthropic API configuration for the generative extraction fallback.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for field extraction and category classification.
    /// Haiku-tier by default -- extraction is a cheap structured task.
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// Maximum tokens to generate per extraction response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            extraction_model: default_extraction_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_extraction_model() -> String {
    "claude-haiku-4-5-20250901".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("caseline").join("caseline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("caseline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Days an abandoned conversation is retained before expiry.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

fn default_ttl_days() -> u32 {
    7
}

/// Practice-area schema configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Path to a practice-area TOML file overriding the embedded default.
    #[serde(default)]
    pub path: Option<String>,
}

/// Inbound HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token for the v1 API. `None` leaves the intake endpoint open
    /// (it fronts a public chat widget).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Requests allowed per client IP per rate-limit window.
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: u32,

    /// Fixed rate-limit window length in seconds.
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            rate_limit_requests: default_rate_limit_requests(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_rate_limit_requests() -> u32 {
    20
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

/// LeadProsper submission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeadProsperConfig {
    /// Base URL of the LeadProsper API.
    #[serde(default = "default_lp_api_url")]
    pub api_url: String,

    /// Bearer token for authentication. `None` requires environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Campaign the leads are posted into.
    #[serde(default)]
    pub campaign_id: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_lp_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retry attempts for transient failures.
    #[serde(default = "default_lp_max_retries")]
    pub max_retries: u32,
}

impl Default for LeadProsperConfig {
    fn default() -> Self {
        Self {
            api_url: default_lp_api_url(),
            api_key: None,
            campaign_id: None,
            timeout_secs: default_lp_timeout_secs(),
            max_retries: default_lp_max_retries(),
        }
    }
}

fn default_lp_api_url() -> String {
    "https://api.leadprosper.io".to_string()
}

fn default_lp_timeout_secs() -> u64 {
    30
}

fn default_lp_max_retries() -> u32 {
    3
}

/// ZIP geocoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeoConfig {
    /// Base URL of the ZIP lookup service.
    #[serde(default = "default_geo_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds. Enrichment is best-effort, so this
    /// stays short.
    #[serde(default = "default_geo_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            api_url: default_geo_api_url(),
            timeout_secs: default_geo_timeout_secs(),
        }
    }
}

fn default_geo_api_url() -> String {
    "https://api.zippopotam.us/us".to_string()
}

fn default_geo_timeout_secs() -> u64 {
    5
}

/// Lead queue worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Name of the delivery queue.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Jobs pulled per batch; batch jobs run concurrently.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between polling rounds when the queue is idle.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Queue-level retry ceiling before a job dead-letters.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Visibility timeout for `processing` jobs; expired locks are
    /// reclaimed back to `queued`.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Bound on the shutdown drain wait.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

fn default_queue_name() -> String {
    "lead-delivery".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> i32 {
    3
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_drain_timeout_secs() -> u64 {
    30
}
