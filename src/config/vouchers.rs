//! Voucher policy configuration

use serde::Deserialize;
use std::time::Duration;

use crate::application::handlers::voucher_admin::{
    DEFAULT_CLEANUP_MIN_AGE_DAYS, DEFAULT_MAX_BULK_SIZE, DEFAULT_PROMOTION_CODE_PREFIX,
};

use super::error::ValidationError;

const MAX_BULK_SIZE_CEILING: usize = 10_000;
const MAX_LOCK_TIMEOUT_MS: u64 = 60_000;

/// Tunables for the redemption path and the administrative surface.
#[derive(Debug, Clone, Deserialize)]
pub struct VoucherPolicyConfig {
    /// Minimum days since expiry before cleanup sweeps a voucher
    #[serde(default = "default_cleanup_min_age_days")]
    pub cleanup_min_age_days: i64,

    /// Prefix for generated system-promotion codes
    #[serde(default = "default_promotion_code_prefix")]
    pub promotion_code_prefix: String,

    /// Largest id list accepted by bulk commands
    #[serde(default = "default_max_bulk_size")]
    pub max_bulk_size: usize,

    /// How long a transaction waits for a voucher row lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl VoucherPolicyConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cleanup_min_age_days < 0 {
            return Err(ValidationError::NegativeCleanupAge);
        }
        let prefix = &self.promotion_code_prefix;
        if prefix.is_empty() || prefix.len() > 12 || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidCodePrefix);
        }
        if self.max_bulk_size == 0 || self.max_bulk_size > MAX_BULK_SIZE_CEILING {
            return Err(ValidationError::InvalidBulkSize {
                max: MAX_BULK_SIZE_CEILING,
            });
        }
        if self.lock_timeout_ms == 0 || self.lock_timeout_ms > MAX_LOCK_TIMEOUT_MS {
            return Err(ValidationError::InvalidLockTimeout);
        }
        Ok(())
    }
}

impl Default for VoucherPolicyConfig {
    fn default() -> Self {
        Self {
            cleanup_min_age_days: default_cleanup_min_age_days(),
            promotion_code_prefix: default_promotion_code_prefix(),
            max_bulk_size: default_max_bulk_size(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

fn default_cleanup_min_age_days() -> i64 {
    DEFAULT_CLEANUP_MIN_AGE_DAYS
}

fn default_promotion_code_prefix() -> String {
    DEFAULT_PROMOTION_CODE_PREFIX.to_string()
}

fn default_max_bulk_size() -> usize {
    DEFAULT_MAX_BULK_SIZE
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VoucherPolicyConfig::default();
        assert_eq!(config.cleanup_min_age_days, 30);
        assert_eq!(config.promotion_code_prefix, "PROMO");
        assert_eq!(config.max_bulk_size, 500);
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let negative_age = VoucherPolicyConfig {
            cleanup_min_age_days: -1,
            ..Default::default()
        };
        assert_eq!(negative_age.validate(), Err(ValidationError::NegativeCleanupAge));

        let bad_prefix = VoucherPolicyConfig {
            promotion_code_prefix: "PROMO-".to_string(),
            ..Default::default()
        };
        assert_eq!(bad_prefix.validate(), Err(ValidationError::InvalidCodePrefix));

        let zero_bulk = VoucherPolicyConfig {
            max_bulk_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_bulk.validate(),
            Err(ValidationError::InvalidBulkSize { .. })
        ));

        let no_wait = VoucherPolicyConfig {
            lock_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(no_wait.validate(), Err(ValidationError::InvalidLockTimeout));
    }
}
