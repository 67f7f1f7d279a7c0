//! Rate limit coordinator - picks an algorithm, merges options, and fails open.

mod fixed_window;
mod maintenance;
mod sliding_window;
mod token_bucket;

use std::sync::Arc;

use crate::domain::{Algorithm, RateLimitOptions, RateLimitOutcome, RateLimitOverrides};
use crate::error::LimiterError;
use crate::ports::{Clock, CounterStore, SystemClock};

/// Rate limiter over a shared counter store.
///
/// Holds no per-key state of its own; every serialisation point lives in the
/// store, so any number of instances may share one store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    defaults: RateLimitOptions,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            defaults: RateLimitOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the defaults that caller overrides are merged over.
    pub fn with_defaults(mut self, defaults: RateLimitOptions) -> Result<Self, LimiterError> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(self)
    }

    pub fn defaults(&self) -> &RateLimitOptions {
        &self.defaults
    }

    /// Check and consume quota for `key`.
    ///
    /// Store failures resolve to [`RateLimitOutcome::Indeterminate`]; only
    /// invalid options produce an error.
    pub async fn check_limit(
        &self,
        key: &str,
        overrides: &RateLimitOverrides,
        algorithm: Algorithm,
    ) -> Result<RateLimitOutcome, LimiterError> {
        let options = overrides.merge_over(&self.defaults);
        options.validate()?;

        let now_ms = self.clock.now_ms();
        let store = self.store.as_ref();

        let result = match algorithm {
            Algorithm::FixedWindow => fixed_window::check(store, key, &options, now_ms).await,
            Algorithm::SlidingWindow => sliding_window::check(store, key, &options, now_ms).await,
            Algorithm::TokenBucket => token_bucket::check(store, key, &options, now_ms).await,
        };

        match result {
            Ok(outcome) => {
                if let RateLimitOutcome::Denied(info) = &outcome {
                    tracing::debug!(
                        key = %info.key,
                        algorithm = %algorithm,
                        points = info.points,
                        reset_time = info.reset_time,
                        "Rate limit exceeded"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    algorithm = %algorithm,
                    error = %e,
                    "Rate limit store unavailable, failing open"
                );
                Ok(RateLimitOutcome::Indeterminate {
                    reason: e.to_string(),
                })
            }
        }
    }

    /// [`check_limit`](Self::check_limit) with the algorithm given by name.
    pub async fn check_limit_named(
        &self,
        key: &str,
        overrides: &RateLimitOverrides,
        algorithm: &str,
    ) -> Result<RateLimitOutcome, LimiterError> {
        let algorithm = algorithm.parse::<Algorithm>()?;
        self.check_limit(key, overrides, algorithm).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{BucketOutcome, BucketRequest};
    use crate::ports::{CounterSnapshot, KeyTtl, LogEntry, ManualClock, StoreError};

    struct UnavailableStore;

    #[async_trait]
    impl CounterStore for UnavailableStore {
        async fn get_counter(&self, _key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn increment_counter(
            &self,
            _key: &str,
            _ttl: Duration,
        ) -> Result<CounterSnapshot, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn record_in_log(&self, _key: &str, _entry: LogEntry) -> Result<u64, StoreError> {
            Err(StoreError::Timeout(Duration::from_millis(50)))
        }

        async fn take_token(
            &self,
            _key: &str,
            _request: BucketRequest,
        ) -> Result<BucketOutcome, StoreError> {
            Err(StoreError::Command("NOSCRIPT".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn ttl(&self, _key: &str) -> Result<KeyTtl, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    /// Records the keys each primitive is called with and always reports an empty store.
    #[derive(Default)]
    struct KeyRecordingStore {
        keys: Mutex<Vec<(&'static str, String)>>,
    }

    impl KeyRecordingStore {
        fn record(&self, op: &'static str, key: &str) {
            self.keys.lock().unwrap().push((op, key.to_string()));
        }
    }

    #[async_trait]
    impl CounterStore for KeyRecordingStore {
        async fn get_counter(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
            self.record("get_counter", key);
            Ok(None)
        }

        async fn increment_counter(
            &self,
            key: &str,
            ttl: Duration,
        ) -> Result<CounterSnapshot, StoreError> {
            self.record("increment_counter", key);
            Ok(CounterSnapshot {
                count: 1,
                ttl: KeyTtl::Expires(ttl),
            })
        }

        async fn record_in_log(&self, key: &str, _entry: LogEntry) -> Result<u64, StoreError> {
            self.record("record_in_log", key);
            Ok(0)
        }

        async fn take_token(
            &self,
            key: &str,
            request: BucketRequest,
        ) -> Result<BucketOutcome, StoreError> {
            self.record("take_token", key);
            Ok(BucketOutcome {
                allowed: true,
                tokens: request.capacity - 1.0,
                created: true,
            })
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.record("delete", key);
            Ok(())
        }

        async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
            self.record("ttl", key);
            Ok(KeyTtl::Missing)
        }

        async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
            self.record("scan_prefix", prefix);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_failure_fails_open_for_every_algorithm() {
        let limiter = RateLimiter::new(Arc::new(UnavailableStore));

        for algorithm in Algorithm::ALL {
            let outcome = limiter
                .check_limit("1.2.3.4:/login", &RateLimitOverrides::new(), algorithm)
                .await
                .unwrap();

            assert!(outcome.success(), "{algorithm} should fail open");
            assert!(outcome.is_fail_open());
            assert!(outcome.info().is_none());
        }
    }

    #[tokio::test]
    async fn test_invalid_overrides_are_rejected_before_the_store() {
        let store = Arc::new(KeyRecordingStore::default());
        let limiter = RateLimiter::new(store.clone());

        let result = limiter
            .check_limit(
                "user:1",
                &RateLimitOverrides::new().max_requests(0),
                Algorithm::TokenBucket,
            )
            .await;

        assert!(matches!(result, Err(LimiterError::InvalidOptions(_))));
        assert!(store.keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_algorithm_name() {
        let limiter = RateLimiter::new(Arc::new(KeyRecordingStore::default()));
        let result = limiter
            .check_limit_named("user:1", &RateLimitOverrides::new(), "gcra")
            .await;
        assert!(matches!(result, Err(LimiterError::UnknownAlgorithm(_))));
    }

    #[tokio::test]
    async fn test_dispatch_uses_namespaced_keys() {
        let store = Arc::new(KeyRecordingStore::default());
        let limiter = RateLimiter::new(store.clone());
        let overrides = RateLimitOverrides::new().key_prefix("rl:");

        limiter
            .check_limit_named("k", &overrides, "fixed")
            .await
            .unwrap();
        limiter
            .check_limit_named("k", &overrides, "sliding_window")
            .await
            .unwrap();
        limiter
            .check_limit_named("k", &overrides, "token_bucket")
            .await
            .unwrap();

        let keys = store.keys.lock().unwrap().clone();
        assert_eq!(
            keys,
            vec![
                ("get_counter", "rl:k".to_string()),
                ("increment_counter", "rl:k".to_string()),
                ("record_in_log", "rl:sliding:k".to_string()),
                ("take_token", "rl:token:k".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_fixed_window_check_reports_expiry_from_ttl() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let limiter = RateLimiter::new(Arc::new(KeyRecordingStore::default()))
            .with_clock(clock.clone());

        let outcome = limiter
            .check_limit(
                "k",
                &RateLimitOverrides::new().window_ms(1500).max_requests(3),
                Algorithm::FixedWindow,
            )
            .await
            .unwrap();

        let info = outcome.info().unwrap();
        assert!(outcome.success());
        assert!(info.is_first_request);
        assert_eq!(info.remaining, 2);
        // ceil(1500 / 1000) = 2 second TTL
        assert_eq!(info.expires_at, 1_700_000_002_000);
        assert_eq!(info.reset_time, info.expires_at);
    }

    #[test]
    fn test_with_defaults_validates() {
        let limiter = RateLimiter::new(Arc::new(UnavailableStore));
        assert!(limiter.with_defaults(RateLimitOptions::new(0, 1)).is_err());
    }
}
