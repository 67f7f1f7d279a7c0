//! Limiter wiring - picks the counter store and applies configured defaults.

use std::sync::Arc;

use tollgate_core::ports::CounterStore;
use tollgate_core::RateLimiter;
use tollgate_infra::InMemoryCounterStore;

#[cfg(feature = "redis")]
use tollgate_infra::RedisCounterStore;

use crate::config::{AdminConfig, StoreBackend};
use crate::error::AdminError;

/// Build the rate limiter with the configured store.
pub async fn build_limiter(config: &AdminConfig) -> Result<RateLimiter, AdminError> {
    let store = build_store(config).await?;
    let limiter = RateLimiter::new(store).with_defaults(config.limits.clone())?;

    tracing::info!(
        backend = ?config.backend,
        window_ms = config.limits.window_ms,
        max_requests = config.limits.max_requests,
        key_prefix = %config.limits.key_prefix,
        "Rate limiter initialized"
    );

    Ok(limiter)
}

#[cfg(feature = "redis")]
async fn build_store(config: &AdminConfig) -> Result<Arc<dyn CounterStore>, AdminError> {
    if config.backend == StoreBackend::Memory {
        tracing::info!("Using in-memory counter store");
        return Ok(Arc::new(InMemoryCounterStore::new()));
    }

    match RedisCounterStore::new(config.redis.clone()).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(e) if config.redis.fallback_to_memory => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Using in-memory counter store."
            );
            Ok(Arc::new(InMemoryCounterStore::new()))
        }
        Err(e) => Err(AdminError::Limiter(tollgate_core::LimiterError::Store(e))),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_store(config: &AdminConfig) -> Result<Arc<dyn CounterStore>, AdminError> {
    debug_assert_eq!(config.backend, StoreBackend::Memory);
    tracing::info!("Running without redis feature - using in-memory counter store");
    Ok(Arc::new(InMemoryCounterStore::new()))
}
