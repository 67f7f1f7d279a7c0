//! Maintenance and introspection, usable outside the request path.

use crate::domain::{Algorithm, CleanupReport, LimitSnapshot};
use crate::error::LimiterError;
use crate::ports::KeyTtl;

use super::RateLimiter;

impl RateLimiter {
    /// Delete the fixed-window counter of `key`.
    ///
    /// Sliding window and token bucket state live under their own keys; see
    /// [`reset_limit_for`](Self::reset_limit_for).
    pub async fn reset_limit(&self, key: &str) -> Result<(), LimiterError> {
        self.reset_limit_for(key, Algorithm::FixedWindow).await
    }

    /// Delete the state `algorithm` keeps for `key`.
    pub async fn reset_limit_for(&self, key: &str, algorithm: Algorithm) -> Result<(), LimiterError> {
        let full_key = algorithm.store_key(&self.defaults.key_prefix, key);
        self.store.delete(&full_key).await?;
        tracing::info!(key = %full_key, algorithm = %algorithm, "Rate limit reset");
        Ok(())
    }

    /// Snapshot of the fixed-window counter of `key`, without touching it.
    pub async fn get_limit_info(&self, key: &str) -> Result<Option<LimitSnapshot>, LimiterError> {
        let full_key = Algorithm::FixedWindow.store_key(&self.defaults.key_prefix, key);

        let Some(snapshot) = self.store.get_counter(&full_key).await? else {
            return Ok(None);
        };

        let ttl_ms = snapshot.ttl.remaining().map(|d| d.as_millis() as u64);
        let now_ms = self.clock.now_ms();

        Ok(Some(LimitSnapshot {
            key: full_key,
            points: snapshot.count,
            remaining: self.defaults.max_requests.saturating_sub(snapshot.count),
            ttl_ms,
            expires_at: ttl_ms.map(|ttl| now_ms + ttl),
        }))
    }

    /// Delete keys under the prefix that have no expiry armed.
    ///
    /// Such keys only appear when an increment landed without its expire, and
    /// would otherwise pin a window shut forever.
    pub async fn cleanup(&self) -> Result<CleanupReport, LimiterError> {
        let prefix = &self.defaults.key_prefix;
        let keys = self.store.scan_prefix(prefix).await?;

        let mut report = CleanupReport {
            scanned: keys.len(),
            removed: 0,
        };

        for key in keys {
            if self.store.ttl(&key).await? == KeyTtl::Persistent {
                self.store.delete(&key).await?;
                report.removed += 1;
                tracing::debug!(key = %key, "Removed rate limit key without expiry");
            }
        }

        tracing::info!(
            prefix = %prefix,
            scanned = report.scanned,
            removed = report.removed,
            "Rate limit cleanup finished"
        );

        Ok(report)
    }
}
