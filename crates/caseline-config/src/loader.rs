// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./caseline.toml` > `~/.config/caseline/caseline.toml`
//! > `/etc/caseline/caseline.toml` with environment variable overrides via
//! `CASELINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CaselineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/caseline/caseline.toml` (system-wide)
/// 3. `~/.config/caseline/caseline.toml` (user XDG config)
/// 4. `./caseline.toml` (local directory)
/// 5. `CASELINE_*` environment variables
pub fn load_config() -> Result<CaselineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CaselineConfig::default()))
        .merge(Toml::file("/etc/caseline/caseline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("caseline/caseline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("caseline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config file specification.
pub fn load_config_from_str(toml_content: &str) -> Result<CaselineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CaselineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CaselineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CaselineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CASELINE_LEADPROSPER_API_KEY` must map
/// to `leadprosper.api_key`, not `leadprosper.api.key`.
fn env_provider() -> Env {
    Env::prefixed("CASELINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("session_", "session.", 1)
            .replacen("schema_", "schema.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("leadprosper_", "leadprosper.", 1)
            .replacen("geo_", "geo.", 1)
            .replacen("worker_", "worker.", 1);
        mapped.into()
    })
}
