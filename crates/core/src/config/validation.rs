//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_version` is blank
    /// - `static_assets` is empty or holds a path that is not root-relative
    /// - `offline_fallback` is not one of the static assets
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }

        if self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        if self.static_assets.is_empty() {
            return Err(ConfigError::Invalid { field: "static_assets".into(), reason: "must not be empty".into() });
        }
        if let Some(path) = self.static_assets.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid {
                field: "static_assets".into(),
                reason: format!("'{path}' is not root-relative"),
            });
        }

        if !self.static_assets.contains(&self.offline_fallback) {
            return Err(ConfigError::Invalid {
                field: "offline_fallback".into(),
                reason: "must be one of the static assets".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.force_activate {
            tracing::warn!(
                cache_version = %self.cache_version,
                "force_activate is off; new asset versions wait for an explicit skip-waiting message"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));

        let config = AppConfig { origin: "ftp://calc.example".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "origin"));
    }

    #[test]
    fn test_validate_blank_version() {
        let config = AppConfig { cache_version: "  ".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_version"));
    }

    #[test]
    fn test_validate_relative_asset() {
        let mut config = AppConfig::default();
        config.static_assets.push("styles/print.css".into());
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "static_assets"));
    }

    #[test]
    fn test_validate_fallback_not_cached() {
        let config = AppConfig { offline_fallback: "/offline.html".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "offline_fallback"));
    }

    #[test]
    fn test_validate_max_bytes_zero() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "max_bytes"));
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));

        let config = AppConfig { timeout_ms: 100, max_bytes: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }
}
