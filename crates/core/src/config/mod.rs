//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FIRECALC_*)
//! 2. TOML config file (if FIRECALC_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::rating::RateTable;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FIRECALC_*)
/// 2. TOML config file (if FIRECALC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding quotes and cached assets.
    ///
    /// Set via FIRECALC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the calculator's assets are served from.
    ///
    /// Set via FIRECALC_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Opaque asset cache version tag; bump on every asset-affecting release.
    ///
    /// Set via FIRECALC_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Root-relative paths that must be cached for an install to succeed.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Cached document served to navigations when the network is down.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Activate a freshly installed version without waiting.
    ///
    /// Set via FIRECALC_FORCE_ACTIVATE environment variable.
    #[serde(default = "default_true")]
    pub force_activate: bool,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via FIRECALC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per asset.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Optional TOML rate table replacing the standard schedule.
    ///
    /// Set via FIRECALC_RATE_TABLE_FILE environment variable.
    #[serde(default)]
    pub rate_table_file: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./firecalc.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_cache_version() -> String {
    "uiic-fire-calc-v1.0.0".into()
}

fn default_static_assets() -> Vec<String> {
    ["/", "/index.html", "/styles.css", "/script.js", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_fallback() -> String {
    "/index.html".into()
}

fn default_user_agent() -> String {
    "firecalc/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_version: default_cache_version(),
            static_assets: default_static_assets(),
            offline_fallback: default_offline_fallback(),
            force_activate: true,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            rate_table_file: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FIRECALC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FIRECALC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The rate table to rate with: the configured file, or the standard schedule.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configured file cannot be loaded.
    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        match &self.rate_table_file {
            Some(path) => RateTable::from_toml_file(path),
            None => Ok(RateTable::standard()),
        }
    }
}
