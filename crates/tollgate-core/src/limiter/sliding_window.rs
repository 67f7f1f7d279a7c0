//! Sliding window log.
//!
//! Every attempt is a sorted-set member scored by its timestamp. The log is
//! pruned, counted and appended in one atomic batch, and the decision uses the
//! count observed before the append.

use uuid::Uuid;

use crate::domain::{Algorithm, RateLimitInfo, RateLimitOptions, RateLimitOutcome};
use crate::ports::{CounterStore, LogEntry, StoreError};

pub(crate) async fn check(
    store: &dyn CounterStore,
    key: &str,
    options: &RateLimitOptions,
    now_ms: u64,
) -> Result<RateLimitOutcome, StoreError> {
    let full_key = Algorithm::SlidingWindow.store_key(&options.key_prefix, key);

    let entry = LogEntry {
        now_ms,
        // Unique even when several requests land in the same millisecond.
        member: format!("{}-{}", now_ms, Uuid::new_v4().simple()),
        window: options.window(),
        ttl: options.window_ttl(),
        limit: options.max_requests,
        record_rejected: options.log_rejected,
    };

    let count = store.record_in_log(&full_key, entry).await?;

    let info = RateLimitInfo::new(
        full_key,
        count,
        options.max_requests.saturating_sub(count),
        now_ms + options.window_ms,
        count == 0,
    );

    if count >= options.max_requests {
        Ok(RateLimitOutcome::Denied(info))
    } else {
        Ok(RateLimitOutcome::Allowed(info))
    }
}
