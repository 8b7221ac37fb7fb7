//! Runtime and process configuration.
//!
//! [`ScrapeConfig`] is the small runtime-updatable record (inter-visit
//! delay, retry budget) that the controller validates, persists, and
//! re-reads across runs. [`AppConfig`](crate::AppConfig) is the immutable
//! process configuration loaded once from environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_config::AppConfig;

/// Upper bound on the retry budget; values above this are clamped.
pub const MAX_RETRIES_CEILING: u32 = 5;

/// Default inter-visit delay in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 2_500;

/// Default number of additional attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

/// Runtime scrape settings, persisted across runs and updatable while idle
/// or mid-run (applies from the next queue iteration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Politeness delay between successive profile visits, in milliseconds.
    pub delay_ms: u64,
    /// Additional attempts after the first failure, clamped to `[0, 5]`.
    pub max_retries: u32,
    /// Whether a structured entry carrying address fields directly on the
    /// top-level object (not inside a nested address object) also seeds the
    /// office list, or only the flat city/address lists.
    #[serde(default)]
    pub flat_entry_seeds_office: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            flat_entry_seeds_office: false,
        }
    }
}

impl ScrapeConfig {
    /// Returns a copy with out-of-range values clamped into their valid
    /// domains. Never fails: callers hand us whatever the settings surface
    /// produced and we store something usable.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            delay_ms: self.delay_ms,
            max_retries: self.max_retries.min(MAX_RETRIES_CEILING),
            flat_entry_seeds_office: self.flat_entry_seeds_office,
        }
    }

    /// Total attempts per URL: the first visit plus the retry budget.
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.sanitized().max_retries + 1
    }
}

/// Load process configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env
/// vars.
///
/// # Errors
///
/// Returns [`ConfigError`] if a value is present but unparseable.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load process configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns [`ConfigError`] if a value is present but unparseable.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build process configuration using the provided env-var lookup function.
///
/// The parsing/validation logic is decoupled from the real environment so
/// tests can drive it with a plain `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    Ok(AppConfig {
        target_host: or_default("NOBAT_TARGET_HOST", "nobat.ir"),
        log_level: or_default("NOBAT_LOG_LEVEL", "info"),
        delay_ms: parse_u64("NOBAT_DELAY_MS", "2500")?,
        max_retries: parse_u32("NOBAT_MAX_RETRIES", "2")?.min(MAX_RETRIES_CEILING),
        nav_timeout_secs: parse_u64("NOBAT_NAV_TIMEOUT_SECS", "45")?,
        link_wait_secs: parse_u64("NOBAT_LINK_WAIT_SECS", "5")?,
        growth_wait_secs: parse_u64("NOBAT_GROWTH_WAIT_SECS", "7")?,
        name_wait_secs: parse_u64("NOBAT_NAME_WAIT_SECS", "8")?,
        max_load_more_rounds: parse_u32("NOBAT_MAX_LOAD_MORE_ROUNDS", "12")?,
    })
}
