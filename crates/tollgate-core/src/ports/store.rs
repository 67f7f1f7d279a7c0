//! Counter store port - the shared, atomically updated state behind every limit.
//!
//! Each method is a single atomic unit against the store. Implementations must
//! never split one of them into separate round trips that another client could
//! interleave with.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{BucketOutcome, BucketRequest};

/// Remaining lifetime of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists but has no expiry armed.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Map a Redis-style `PTTL` reply (`-2` missing, `-1` persistent).
    pub fn from_pttl(pttl: i64) -> Self {
        match pttl {
            -1 => KeyTtl::Persistent,
            ms if ms >= 0 => KeyTtl::Expires(Duration::from_millis(ms as u64)),
            _ => KeyTtl::Missing,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            KeyTtl::Expires(d) => Some(*d),
            _ => None,
        }
    }
}

/// Counter value together with its TTL, read in one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub count: u64,
    pub ttl: KeyTtl,
}

/// One request to append to a sliding window log.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Score of the new member, in epoch milliseconds.
    pub now_ms: u64,
    /// Unique member value.
    pub member: String,
    /// Members scored at or before `now_ms - window` are pruned first.
    pub window: Duration,
    /// TTL re-armed on the log.
    pub ttl: Duration,
    /// Limit the pre-add count is compared with when `record_rejected` is false.
    pub limit: u64,
    /// Add the member even when the pre-add count is already at `limit`.
    pub record_rejected: bool,
}

impl LogEntry {
    /// Lowest score that survives pruning is strictly above this cutoff.
    pub fn cutoff_ms(&self) -> i64 {
        self.now_ms as i64 - self.window.as_millis() as i64
    }
}

/// Atomic counter store shared by every limiter instance.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a fixed-window counter without mutating it.
    async fn get_counter(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError>;

    /// Increment a counter by one, arming `ttl` when the increment created it.
    async fn increment_counter(&self, key: &str, ttl: Duration)
        -> Result<CounterSnapshot, StoreError>;

    /// Prune, count, append and re-arm a sliding window log.
    ///
    /// Returns the number of members counted after pruning and before the add.
    async fn record_in_log(&self, key: &str, entry: LogEntry) -> Result<u64, StoreError>;

    /// Run one refill-and-spend step of a token bucket.
    async fn take_token(&self, key: &str, request: BucketRequest)
        -> Result<BucketOutcome, StoreError>;

    /// Delete a key unconditionally.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Every key that starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Counter store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ttl_from_pttl() {
        assert_eq!(KeyTtl::from_pttl(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_pttl(-1), KeyTtl::Persistent);
        assert_eq!(
            KeyTtl::from_pttl(1500),
            KeyTtl::Expires(Duration::from_millis(1500))
        );
        assert_eq!(KeyTtl::Persistent.remaining(), None);
    }

    #[test]
    fn test_log_entry_cutoff_can_be_negative() {
        let entry = LogEntry {
            now_ms: 200,
            member: "m".to_string(),
            window: Duration::from_millis(1000),
            ttl: Duration::from_secs(1),
            limit: 1,
            record_rejected: true,
        };
        assert_eq!(entry.cutoff_ms(), -800);
    }
}
