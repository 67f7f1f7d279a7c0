//! Standard rate limit response headers derived from [`RateLimitInfo`].

use serde::{Deserialize, Serialize};

use tollgate_core::RateLimitInfo;

pub const LIMIT: &str = "X-RateLimit-Limit";
pub const REMAINING: &str = "X-RateLimit-Remaining";
pub const RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";
pub const RATE_LIMIT_RETRY_AFTER: &str = "X-RateLimit-Retry-After";
pub const FIRST: &str = "X-RateLimit-First";

/// Header values a guard attaches to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitHeaders {
    /// `info.points` at the time of the check.
    pub limit: u64,
    pub remaining: u64,
    /// Reset time in epoch seconds, rounded up.
    pub reset: u64,
    /// Seconds until reset, rounded up; absent once the reset time has passed.
    pub retry_after: Option<u64>,
    pub first: bool,
}

impl RateLimitHeaders {
    pub fn from_info(info: &RateLimitInfo, now_ms: u64) -> Self {
        let retry_after_ms = info.retry_after_ms(now_ms);

        Self {
            limit: info.points,
            remaining: info.remaining,
            reset: info.reset_time.div_ceil(1000),
            retry_after: (retry_after_ms > 0).then(|| retry_after_ms.div_ceil(1000)),
            first: info.is_first_request,
        }
    }

    /// Header name/value pairs in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (LIMIT, self.limit.to_string()),
            (REMAINING, self.remaining.to_string()),
            (RESET, self.reset.to_string()),
        ];

        if let Some(retry_after) = self.retry_after {
            pairs.push((RETRY_AFTER, retry_after.to_string()));
            pairs.push((RATE_LIMIT_RETRY_AFTER, retry_after.to_string()));
        }

        if self.first {
            pairs.push((FIRST, "true".to_string()));
        }

        pairs
    }
}
