// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, positive batch sizes, and sane
//! retry ceilings. Collects all errors instead of failing fast.

use crate::diagnostic::ConfigError;
use crate::model::CaselineConfig;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &CaselineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let host = config.gateway.host.trim();
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.rate_limit_requests == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.rate_limit_requests must be at least 1".to_string(),
        });
    }

    if config.gateway.rate_limit_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.rate_limit_window_secs must be at least 1".to_string(),
        });
    }

    if config.session.ttl_days == 0 {
        errors.push(ConfigError::Validation {
            message: "session.ttl_days must be at least 1".to_string(),
        });
    }

    if config.worker.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.batch_size must be at least 1".to_string(),
        });
    }

    if config.worker.max_attempts < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "worker.max_attempts must be at least 1, got {}",
                config.worker.max_attempts
            ),
        });
    }

    if config.worker.visibility_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.visibility_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.leadprosper.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "leadprosper.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.leadprosper.api_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "leadprosper.api_url must not be empty".to_string(),
        });
    }

    if config.geo.api_url.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "geo.api_url must not be empty".to_string(),
        });
    }

    if let Some(path) = &config.schema.path
        && path.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "schema.path must not be empty when set".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = CaselineConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = CaselineConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let mut config = CaselineConfig::default();
        config.worker.batch_size = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("batch_size"))
        ));
    }

    #[test]
    fn zero_max_attempts_fails_validation() {
        let mut config = CaselineConfig::default();
        config.worker.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = CaselineConfig::default();
        config.storage.database_path = "".to_string();
        config.worker.batch_size = 0;
        config.session.ttl_days = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3, "expected all errors collected, got {}", errors.len());
    }

    #[test]
    fn bad_host_fails_validation() {
        let mut config = CaselineConfig::default();
        config.gateway.host = "not a host!".to_string();
        assert!(validate_config(&config).is_err());
    }
}
