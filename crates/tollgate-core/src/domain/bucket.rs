//! Token bucket state and the refill-then-spend step.
//!
//! Adapters must apply [`BucketState::step`] (or an equivalent server-side
//! script) as one indivisible unit per key.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Cost of one request in tokens.
pub const TOKENS_PER_REQUEST: f64 = 1.0;

/// Parameters of one token bucket step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketRequest {
    pub capacity: f64,
    /// Tokens credited per second.
    pub refill_per_sec: f64,
    /// Current time in epoch seconds, fractional.
    pub now_secs: f64,
    /// TTL armed on the stored state after every step.
    pub ttl: Duration,
}

impl BucketRequest {
    /// Bucket of `max_requests` tokens refilled over `window_ms`.
    pub fn new(max_requests: u64, window_ms: u64, now_ms: u64) -> Self {
        let capacity = max_requests as f64;
        let refill_per_sec = capacity / (window_ms as f64 / 1000.0);
        // capacity / refill_per_sec, computed in integers to dodge float drift.
        let ttl_secs = window_ms.div_ceil(1000).max(1);

        Self {
            capacity,
            refill_per_sec,
            now_secs: now_ms as f64 / 1000.0,
            ttl: Duration::from_secs(ttl_secs),
        }
    }
}

/// Stored bucket state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub tokens: f64,
    /// Epoch seconds of the last refill, fractional.
    pub last_refill: f64,
}

/// Result of one bucket step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketOutcome {
    pub allowed: bool,
    /// Tokens left after the step.
    pub tokens: f64,
    /// The step created the bucket.
    pub created: bool,
}

impl BucketState {
    pub fn full(capacity: f64, now_secs: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: now_secs,
        }
    }

    /// Refill for the elapsed time, then spend one token if a whole one is available.
    ///
    /// Refill accrues fractionally (`tokens + elapsed * rate`) rather than in
    /// whole tokens, so a stored balance may be non-integral.
    pub fn step(existing: Option<BucketState>, request: &BucketRequest) -> (BucketState, BucketOutcome) {
        let created = existing.is_none();
        let state =
            existing.unwrap_or_else(|| BucketState::full(request.capacity, request.now_secs));

        let elapsed = (request.now_secs - state.last_refill).max(0.0);
        let mut tokens = (state.tokens + elapsed * request.refill_per_sec)
            .min(request.capacity)
            .max(0.0);

        let allowed = tokens >= TOKENS_PER_REQUEST;
        if allowed {
            tokens -= TOKENS_PER_REQUEST;
        }

        let next = BucketState {
            tokens,
            last_refill: request.now_secs.max(state.last_refill),
        };

        (
            next,
            BucketOutcome {
                allowed,
                tokens,
                created,
            },
        )
    }
}
