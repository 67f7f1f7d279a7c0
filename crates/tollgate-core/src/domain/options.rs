use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LimiterError;

/// Prefix prepended to every store key unless the caller overrides it.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit:";
/// Default window: 15 minutes.
pub const DEFAULT_WINDOW_MS: u64 = 15 * 60 * 1000;
/// Default quota per window, or bucket capacity.
pub const DEFAULT_MAX_REQUESTS: u64 = 100;

/// Options of a single protected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    /// Window size in milliseconds.
    pub window_ms: u64,
    /// Quota per window (fixed/sliding) or bucket capacity (token bucket).
    pub max_requests: u64,
    /// Namespace prepended to every derived store key.
    pub key_prefix: String,
    /// Consumed by the request guard, not by the algorithms.
    pub skip_successful_requests: bool,
    /// Consumed by the request guard, not by the algorithms.
    pub skip_failed_requests: bool,
    /// Sliding window only: keep rejected attempts in the log.
    pub log_rejected: bool,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_requests: DEFAULT_MAX_REQUESTS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            skip_successful_requests: false,
            skip_failed_requests: false,
            log_rejected: true,
        }
    }
}

impl RateLimitOptions {
    pub fn new(window_ms: u64, max_requests: u64) -> Self {
        Self {
            window_ms,
            max_requests,
            ..Self::default()
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_log_rejected(mut self, log_rejected: bool) -> Self {
        self.log_rejected = log_rejected;
        self
    }

    /// Reject options the algorithms cannot divide by or expire with.
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.window_ms == 0 {
            return Err(LimiterError::InvalidOptions(
                "windowMs must be greater than zero".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(LimiterError::InvalidOptions(
                "maxRequests must be greater than zero".to_string(),
            ));
        }
        if self.key_prefix.is_empty() {
            return Err(LimiterError::InvalidOptions(
                "keyPrefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Store TTL for window-scoped state: `ceil(windowMs / 1000)` seconds.
    pub fn window_ttl(&self) -> Duration {
        Duration::from_secs(self.window_ms.div_ceil(1000).max(1))
    }
}

/// Caller-supplied partial options, merged over the limiter defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitOverrides {
    pub window_ms: Option<u64>,
    pub max_requests: Option<u64>,
    pub key_prefix: Option<String>,
    pub skip_successful_requests: Option<bool>,
    pub skip_failed_requests: Option<bool>,
    pub log_rejected: Option<bool>,
}

impl RateLimitOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_ms(mut self, window_ms: u64) -> Self {
        self.window_ms = Some(window_ms);
        self
    }

    pub fn max_requests(mut self, max_requests: u64) -> Self {
        self.max_requests = Some(max_requests);
        self
    }

    pub fn key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(key_prefix.into());
        self
    }

    pub fn log_rejected(mut self, log_rejected: bool) -> Self {
        self.log_rejected = Some(log_rejected);
        self
    }

    /// Overlay the set fields onto `defaults`.
    pub fn merge_over(&self, defaults: &RateLimitOptions) -> RateLimitOptions {
        RateLimitOptions {
            window_ms: self.window_ms.unwrap_or(defaults.window_ms),
            max_requests: self.max_requests.unwrap_or(defaults.max_requests),
            key_prefix: self
                .key_prefix
                .clone()
                .unwrap_or_else(|| defaults.key_prefix.clone()),
            skip_successful_requests: self
                .skip_successful_requests
                .unwrap_or(defaults.skip_successful_requests),
            skip_failed_requests: self
                .skip_failed_requests
                .unwrap_or(defaults.skip_failed_requests),
            log_rejected: self.log_rejected.unwrap_or(defaults.log_rejected),
        }
    }
}

impl From<RateLimitOptions> for RateLimitOverrides {
    fn from(options: RateLimitOptions) -> Self {
        Self {
            window_ms: Some(options.window_ms),
            max_requests: Some(options.max_requests),
            key_prefix: Some(options.key_prefix),
            skip_successful_requests: Some(options.skip_successful_requests),
            skip_failed_requests: Some(options.skip_failed_requests),
            log_rejected: Some(options.log_rejected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RateLimitOptions::default();
        assert_eq!(options.window_ms, 900_000);
        assert_eq!(options.max_requests, 100);
        assert_eq!(options.key_prefix, "rate_limit:");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_unset_defaults() {
        let merged = RateLimitOverrides::new()
            .max_requests(3)
            .merge_over(&RateLimitOptions::default());

        assert_eq!(merged.max_requests, 3);
        assert_eq!(merged.window_ms, DEFAULT_WINDOW_MS);
        assert_eq!(merged.key_prefix, DEFAULT_KEY_PREFIX);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(matches!(
            RateLimitOptions::new(0, 10).validate(),
            Err(LimiterError::InvalidOptions(_))
        ));
        assert!(matches!(
            RateLimitOptions::new(1000, 0).validate(),
            Err(LimiterError::InvalidOptions(_))
        ));
        assert!(matches!(
            RateLimitOptions::new(1000, 1).with_key_prefix("").validate(),
            Err(LimiterError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_window_ttl_rounds_up() {
        assert_eq!(RateLimitOptions::new(1000, 1).window_ttl(), Duration::from_secs(1));
        assert_eq!(RateLimitOptions::new(1001, 1).window_ttl(), Duration::from_secs(2));
        assert_eq!(RateLimitOptions::new(250, 1).window_ttl(), Duration::from_secs(1));
    }

    #[test]
    fn test_overrides_deserialize_camel_case() {
        let overrides: RateLimitOverrides =
            serde_json::from_str(r#"{"windowMs": 1000, "maxRequests": 5}"#).unwrap();
        assert_eq!(overrides.window_ms, Some(1000));
        assert_eq!(overrides.max_requests, Some(5));
        assert_eq!(overrides.key_prefix, None);
    }
}
