//! Engine configuration.
//!
//! Env-driven configuration with typed defaults. Every field can be
//! overridden through a `WAITROOM_*` environment variable; parse failures
//! surface as `ConfigurationError` rather than falling back silently.

use std::time::Duration;

use crate::constants::defaults;
use crate::error::{Result, WaitroomError};

#[derive(Debug, Clone)]
pub struct WaitroomConfig {
    /// Postgres connection string for the audit store.
    pub database_url: String,
    /// Redis connection string for the fast ordered store.
    pub redis_url: String,
    /// Scheduler tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// Users promoted per tick, before the capacity clamp.
    pub promotion_batch_size: usize,
    /// Bounded wait for the per-queue promotion lock, in milliseconds.
    pub lock_wait_ms: u64,
    /// Promotion lock lease TTL in milliseconds.
    pub lock_lease_ms: u64,
    /// Coordinator QueueConfig cache TTL in seconds.
    pub config_cache_ttl_secs: u64,
}

impl Default for WaitroomConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/waitroom_development".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            tick_interval_ms: defaults::TICK_INTERVAL_MS,
            promotion_batch_size: defaults::PROMOTION_BATCH_SIZE,
            lock_wait_ms: defaults::LOCK_WAIT_MS,
            lock_lease_ms: defaults::LOCK_LEASE_MS,
            config_cache_ttl_secs: defaults::CONFIG_CACHE_TTL_SECS,
        }
    }
}

impl WaitroomConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(redis_url) = std::env::var("REDIS_URL") {
            config.redis_url = redis_url;
        }

        if let Ok(interval) = std::env::var("WAITROOM_TICK_INTERVAL_MS") {
            config.tick_interval_ms = interval.parse().map_err(|e| {
                WaitroomError::ConfigurationError(format!("Invalid tick_interval_ms: {e}"))
            })?;
        }

        if let Ok(batch) = std::env::var("WAITROOM_PROMOTION_BATCH_SIZE") {
            config.promotion_batch_size = batch.parse().map_err(|e| {
                WaitroomError::ConfigurationError(format!("Invalid promotion_batch_size: {e}"))
            })?;
        }

        if let Ok(wait) = std::env::var("WAITROOM_LOCK_WAIT_MS") {
            config.lock_wait_ms = wait.parse().map_err(|e| {
                WaitroomError::ConfigurationError(format!("Invalid lock_wait_ms: {e}"))
            })?;
        }

        if let Ok(lease) = std::env::var("WAITROOM_LOCK_LEASE_MS") {
            config.lock_lease_ms = lease.parse().map_err(|e| {
                WaitroomError::ConfigurationError(format!("Invalid lock_lease_ms: {e}"))
            })?;
        }

        if let Ok(ttl) = std::env::var("WAITROOM_CONFIG_CACHE_TTL_SECS") {
            config.config_cache_ttl_secs = ttl.parse().map_err(|e| {
                WaitroomError::ConfigurationError(format!("Invalid config_cache_ttl_secs: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or thrash the scheduler.
    pub fn validate(&self) -> Result<()> {
        if self.promotion_batch_size == 0 {
            return Err(WaitroomError::ConfigurationError(
                "promotion_batch_size must be at least 1".to_string(),
            ));
        }
        if self.lock_lease_ms <= self.lock_wait_ms {
            return Err(WaitroomError::ConfigurationError(format!(
                "lock_lease_ms ({}) must exceed lock_wait_ms ({})",
                self.lock_lease_ms, self.lock_wait_ms
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub fn config_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.config_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WaitroomConfig::default();
        assert_eq!(config.promotion_batch_size, 100);
        assert_eq!(config.tick_interval_ms, 1_000);
        assert_eq!(config.lock_wait_ms, 500);
        assert_eq!(config.lock_lease_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_rejected() {
        let config = WaitroomConfig {
            promotion_batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(WaitroomError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_lease_must_exceed_wait() {
        let config = WaitroomConfig {
            lock_wait_ms: 5_000,
            lock_lease_ms: 1_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
