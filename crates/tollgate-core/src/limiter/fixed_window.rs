//! Fixed window counter.
//!
//! Admits up to `maxRequests` per TTL-bounded window. Traffic straddling a
//! window boundary can see up to twice that across the two windows.

use crate::domain::{Algorithm, RateLimitInfo, RateLimitOptions, RateLimitOutcome};
use crate::ports::{CounterStore, KeyTtl, StoreError};

pub(crate) async fn check(
    store: &dyn CounterStore,
    key: &str,
    options: &RateLimitOptions,
    now_ms: u64,
) -> Result<RateLimitOutcome, StoreError> {
    let full_key = Algorithm::FixedWindow.store_key(&options.key_prefix, key);

    // Once at the limit, deny without incrementing so the count stops growing.
    if let Some(current) = store.get_counter(&full_key).await? {
        if current.count >= options.max_requests {
            let expires_at = expires_at(now_ms, current.ttl, options);
            let info = RateLimitInfo::new(full_key, current.count, 0, expires_at, false);
            return Ok(RateLimitOutcome::Denied(info));
        }
    }

    let updated = store
        .increment_counter(&full_key, options.window_ttl())
        .await?;

    let info = RateLimitInfo::new(
        full_key,
        updated.count,
        options.max_requests.saturating_sub(updated.count),
        expires_at(now_ms, updated.ttl, options),
        updated.count == 1,
    );

    // A concurrent caller may have incremented between the read and ours.
    if updated.count <= options.max_requests {
        Ok(RateLimitOutcome::Allowed(info))
    } else {
        Ok(RateLimitOutcome::Denied(info))
    }
}

fn expires_at(now_ms: u64, ttl: KeyTtl, options: &RateLimitOptions) -> u64 {
    match ttl.remaining() {
        Some(remaining) => now_ms + remaining.as_millis() as u64,
        None => now_ms + options.window_ms,
    }
}
