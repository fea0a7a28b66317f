//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `VOUCHER_ENGINE` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use voucher_engine::config::{init_tracing, AppConfig};
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! init_tracing(&config.logging)?;
//! # Ok::<(), voucher_engine::config::ConfigError>(())
//! ```

mod database;
mod error;
mod logging;
mod vouchers;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use vouchers::VoucherPolicyConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Redemption and administrative tunables
    #[serde(default)]
    pub vouchers: VoucherPolicyConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `VOUCHER_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `VOUCHER_ENGINE__DATABASE__URL=...` -> `database.url = ...`
    /// - `VOUCHER_ENGINE__VOUCHERS__LOCK_TIMEOUT_MS=2000` -> `vouchers.lock_timeout_ms = 2000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its expected type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VOUCHER_ENGINE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.logging.validate()?;
        self.vouchers.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "VOUCHER_ENGINE__DATABASE__URL",
        "VOUCHER_ENGINE__LOGGING__FORMAT",
        "VOUCHER_ENGINE__VOUCHERS__LOCK_TIMEOUT_MS",
        "VOUCHER_ENGINE__VOUCHERS__PROMOTION_CODE_PREFIX",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn loads_minimal_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("VOUCHER_ENGINE__DATABASE__URL", "postgresql://test@localhost/vouchers");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/vouchers");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.vouchers.max_bulk_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("VOUCHER_ENGINE__DATABASE__URL", "postgresql://test@localhost/vouchers");
        env::set_var("VOUCHER_ENGINE__LOGGING__FORMAT", "json");
        env::set_var("VOUCHER_ENGINE__VOUCHERS__LOCK_TIMEOUT_MS", "2000");
        env::set_var("VOUCHER_ENGINE__VOUCHERS__PROMOTION_CODE_PREFIX", "XMAS");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.vouchers.lock_timeout_ms, 2000);
        assert_eq!(config.vouchers.promotion_code_prefix, "XMAS");
    }

    #[test]
    fn missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(AppConfig::load().is_err());
    }
}
