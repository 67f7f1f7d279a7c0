//! Token bucket.
//!
//! `points` reports whole tokens left after the step and `remaining` is
//! `capacity - points`.

use crate::domain::{Algorithm, BucketRequest, RateLimitInfo, RateLimitOptions, RateLimitOutcome};
use crate::ports::{CounterStore, StoreError};

pub(crate) async fn check(
    store: &dyn CounterStore,
    key: &str,
    options: &RateLimitOptions,
    now_ms: u64,
) -> Result<RateLimitOutcome, StoreError> {
    let full_key = Algorithm::TokenBucket.store_key(&options.key_prefix, key);
    let request = BucketRequest::new(options.max_requests, options.window_ms, now_ms);

    let outcome = store.take_token(&full_key, request).await?;

    let points = outcome.tokens.max(0.0).floor() as u64;
    let info = RateLimitInfo::new(
        full_key,
        points,
        options.max_requests.saturating_sub(points),
        now_ms + request.ttl.as_millis() as u64,
        outcome.created,
    );

    if outcome.allowed {
        Ok(RateLimitOutcome::Allowed(info))
    } else {
        Ok(RateLimitOutcome::Denied(info))
    }
}
