//! Admin configuration loaded from environment variables.

use std::env;

use tollgate_core::RateLimitOptions;
use tollgate_core::domain::{DEFAULT_KEY_PREFIX, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

#[cfg(feature = "redis")]
use tollgate_infra::RedisConfig;

/// Which counter store to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Admin configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub backend: StoreBackend,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
    /// Defaults the limiter merges per-check overrides over.
    pub limits: RateLimitOptions,
    /// Six-field cron expression for the daemon's cleanup sweep.
    pub sweep_schedule: String,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let backend = match env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ if cfg!(feature = "redis") => StoreBackend::Redis,
            _ => StoreBackend::Memory,
        };

        let limits = RateLimitOptions {
            window_ms: env::var("RATE_LIMIT_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_WINDOW_MS),
            max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_REQUESTS),
            key_prefix: env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string()),
            ..RateLimitOptions::default()
        };

        Self {
            backend,
            #[cfg(feature = "redis")]
            redis: RedisConfig::from_env(),
            limits,
            sweep_schedule: env::var("SWEEP_SCHEDULE")
                .unwrap_or_else(|_| "0 */5 * * * *".to_string()),
        }
    }
}
