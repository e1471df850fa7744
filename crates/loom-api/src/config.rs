//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use loom_core::validation::validate_tax_rate_bps;
use loom_core::MAX_PAGE_SIZE;

/// Loom configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// HMAC secret for principal tokens
    pub jwt_secret: String,

    /// Token lifetime in seconds
    pub jwt_lifetime_secs: i64,

    /// Flat storefront shipping fee in minor units
    pub shipping_flat: i64,

    /// Storefront tax in basis points
    pub checkout_tax_bps: u32,

    /// Counter tax in basis points
    pub counter_tax_bps: u32,

    /// Default listing page size
    pub page_size: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            database_path: lookup("LOOM_DB_PATH").unwrap_or_else(|| "./loom.db".to_string()),

            db_max_connections: parse_or(&lookup, "LOOM_DB_MAX_CONNECTIONS", 5)?,

            jwt_secret: lookup("LOOM_JWT_SECRET")
                // Dev fallback only when unset; an empty value is refused below
                .unwrap_or_else(|| "loom-dev-secret-change-in-production".to_string()),

            jwt_lifetime_secs: parse_or(&lookup, "LOOM_JWT_LIFETIME_SECS", 3600)?, // 1 hour

            shipping_flat: parse_or(&lookup, "LOOM_SHIPPING_FLAT", 0)?,

            checkout_tax_bps: parse_or(&lookup, "LOOM_CHECKOUT_TAX_BPS", 0)?,

            counter_tax_bps: parse_or(&lookup, "LOOM_COUNTER_TAX_BPS", 0)?,

            page_size: parse_or(&lookup, "LOOM_PAGE_SIZE", 20)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("LOOM_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.shipping_flat < 0 {
            return Err(ConfigError::InvalidValue("LOOM_SHIPPING_FLAT".to_string()));
        }
        if validate_tax_rate_bps(config.checkout_tax_bps).is_err() {
            return Err(ConfigError::InvalidValue("LOOM_CHECKOUT_TAX_BPS".to_string()));
        }
        if validate_tax_rate_bps(config.counter_tax_bps).is_err() {
            return Err(ConfigError::InvalidValue("LOOM_COUNTER_TAX_BPS".to_string()));
        }
        if config.page_size == 0 || config.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue("LOOM_PAGE_SIZE".to_string()));
        }
        if config.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("LOOM_JWT_SECRET".to_string()));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
