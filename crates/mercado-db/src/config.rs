//! # Environment Configuration
//!
//! Store settings read from the process environment.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variable                         Default         Feeds                │
//! │  ───────────────────────────────  ──────────────  ──────────────────── │
//! │  MERCADO_DATABASE_PATH            ./mercado.db    DbConfig             │
//! │  MERCADO_MAX_CONNECTIONS          5               DbConfig             │
//! │  MERCADO_BUSY_TIMEOUT_MS          5000            DbConfig             │
//! │  MERCADO_ORDER_NUMBER_ATTEMPTS    3               DbConfig             │
//! │  MERCADO_LOW_STOCK_THRESHOLD      10              ReportSettings       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::pool::DbConfig;
use mercado_core::ReportSettings;

/// Configuration loaded from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MercadoConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
    pub order_number_attempts: u32,
    pub low_stock_threshold: i64,
}

impl Default for MercadoConfig {
    fn default() -> Self {
        MercadoConfig {
            database_path: PathBuf::from("./mercado.db"),
            max_connections: 5,
            busy_timeout_ms: 5000,
            order_number_attempts: 3,
            low_stock_threshold: mercado_core::DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

impl MercadoConfig {
    /// Loads configuration from `MERCADO_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup`; unset keys take their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MercadoConfig::default();

        let config = MercadoConfig {
            database_path: lookup("MERCADO_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            max_connections: parse_or(&lookup, "MERCADO_MAX_CONNECTIONS", defaults.max_connections)?,
            busy_timeout_ms: parse_or(&lookup, "MERCADO_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,
            order_number_attempts: parse_or(
                &lookup,
                "MERCADO_ORDER_NUMBER_ATTEMPTS",
                defaults.order_number_attempts,
            )?,
            low_stock_threshold: parse_or(
                &lookup,
                "MERCADO_LOW_STOCK_THRESHOLD",
                defaults.low_stock_threshold,
            )?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("MERCADO_MAX_CONNECTIONS".to_string()));
        }
        if config.order_number_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "MERCADO_ORDER_NUMBER_ATTEMPTS".to_string(),
            ));
        }
        if config.low_stock_threshold < 0 {
            return Err(ConfigError::InvalidValue(
                "MERCADO_LOW_STOCK_THRESHOLD".to_string(),
            ));
        }

        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Dashboard settings with the configured threshold.
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            low_stock_threshold: self.low_stock_threshold,
            ..ReportSettings::default()
        }
    }

    /// Pool configuration for [`Database::new`](crate::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .order_number_attempts(self.order_number_attempts)
            .reports(self.report_settings())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
