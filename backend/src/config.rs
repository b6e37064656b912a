//! Configuration management for the inventory ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with LEDGER_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Ledger behaviour
    pub ledger: LedgerConfig,

    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Longest wait for a stock or document row lock, in milliseconds
    pub lock_timeout_ms: u64,

    /// Balances strictly below this (and above zero) count as low stock
    pub low_stock_threshold: Decimal,

    /// Default look-ahead for expiring stock, in days
    pub expiry_window_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub filter: String,

    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("LEDGER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("ledger.lock_timeout_ms", 5000)?
            .set_default("ledger.low_stock_threshold", "10")?
            .set_default("ledger.expiry_window_days", 30)?
            .set_default("logging.filter", "inventory_ledger=info,ledger_admin=info,sqlx=warn")?
            .set_default("logging.json", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LEDGER_ prefix)
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5000,
            low_stock_threshold: Decimal::from(10),
            expiry_window_days: 30,
        }
    }
}
