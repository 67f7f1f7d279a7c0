//! In-memory counter store - used for tests and as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tollgate_core::domain::{BucketOutcome, BucketRequest, BucketState};
use tollgate_core::ports::{
    Clock, CounterSnapshot, CounterStore, KeyTtl, LogEntry, StoreError, SystemClock,
};

enum Value {
    Counter(u64),
    /// `(score_ms, member)` pairs of a sliding window log.
    Log(Vec<(u64, String)>),
    Bucket(BucketState),
}

struct Entry {
    value: Value,
    /// Epoch milliseconds.
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.map(|exp| now_ms >= exp).unwrap_or(false)
    }

    fn ttl(&self, now_ms: u64) -> KeyTtl {
        match self.expires_at {
            Some(exp) => KeyTtl::Expires(Duration::from_millis(exp.saturating_sub(now_ms))),
            None => KeyTtl::Persistent,
        }
    }
}

/// In-memory counter store using a HashMap behind an async RwLock.
///
/// Every mutating operation holds the write lock for its whole duration, which
/// makes it atomic with respect to every other caller in this process.
/// Note: State is per-process and lost on restart; limits are not shared
/// across instances.
pub struct InMemoryCounterStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Expire entries against `clock` instead of the system clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Write a raw counter, optionally without expiry.
    pub async fn insert_counter(&self, key: &str, count: u64, ttl: Option<Duration>) {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Counter(count),
                expires_at: ttl.map(|d| now_ms + d.as_millis() as u64),
            },
        );
    }

    /// Number of members in a sliding window log, including stale ones.
    pub async fn log_len(&self, key: &str) -> usize {
        let entries = self.entries.read().await;
        match entries.get(key).map(|e| &e.value) {
            Some(Value::Log(log)) => log.len(),
            _ => 0,
        }
    }

    /// Number of stored entries, expired ones included until reclaimed.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored token bucket state, if any.
    pub async fn bucket_state(&self, key: &str) -> Option<BucketState> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => match entry.value {
                Value::Bucket(state) => Some(state),
                _ => None,
            },
            _ => None,
        }
    }

    fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str, now_ms: u64) {
        if entries.get(key).is_some_and(|e| e.is_expired(now_ms)) {
            entries.remove(key);
        }
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Command(format!(
            "WRONGTYPE operation against {key} holding the wrong kind of value"
        ))
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get_counter(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => match entry.value {
                Value::Counter(count) => Ok(Some(CounterSnapshot {
                    count,
                    ttl: entry.ttl(now_ms),
                })),
                _ => Err(Self::wrong_type(key)),
            },
            _ => Ok(None),
        }
    }

    async fn increment_counter(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now_ms);

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Counter(0),
            expires_at: None,
        });

        let count = match &mut entry.value {
            Value::Counter(count) => {
                *count += 1;
                *count
            }
            _ => return Err(Self::wrong_type(key)),
        };

        if count == 1 {
            entry.expires_at = Some(now_ms + ttl.as_millis() as u64);
        }

        Ok(CounterSnapshot {
            count,
            ttl: entry.ttl(now_ms),
        })
    }

    async fn record_in_log(&self, key: &str, entry: LogEntry) -> Result<u64, StoreError> {
        let now_ms = self.clock.now_ms();
        let cutoff = entry.cutoff_ms();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now_ms);

        let stored = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Log(Vec::new()),
            expires_at: None,
        });

        let Value::Log(log) = &mut stored.value else {
            return Err(Self::wrong_type(key));
        };

        log.retain(|(score, _)| *score as i64 > cutoff);
        let count = log.len() as u64;

        if entry.record_rejected || count < entry.limit {
            log.push((entry.now_ms, entry.member));
        }
        stored.expires_at = Some(now_ms + entry.ttl.as_millis() as u64);

        Ok(count)
    }

    async fn take_token(
        &self,
        key: &str,
        request: BucketRequest,
    ) -> Result<BucketOutcome, StoreError> {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        Self::purge_expired(&mut entries, key, now_ms);

        let existing = match entries.get(key).map(|e| &e.value) {
            Some(Value::Bucket(state)) => Some(*state),
            Some(_) => return Err(Self::wrong_type(key)),
            None => None,
        };

        let (next, outcome) = BucketState::step(existing, &request);
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Bucket(next),
                expires_at: Some(now_ms + request.ttl.as_millis() as u64),
            },
        );

        Ok(outcome)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;
        Ok(match entries.get(key) {
            Some(entry) if !entry.is_expired(now_ms) => entry.ttl(now_ms),
            _ => KeyTtl::Missing,
        })
    }

    /// Also reclaims every expired entry, whatever its prefix.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired(now_ms));

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::ports::ManualClock;

    const START_MS: u64 = 1_700_000_000_000;

    fn store() -> (Arc<ManualClock>, InMemoryCounterStore) {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store = InMemoryCounterStore::with_clock(clock.clone());
        (clock, store)
    }

    fn log_entry(now_ms: u64, member: &str, limit: u64, record_rejected: bool) -> LogEntry {
        LogEntry {
            now_ms,
            member: member.to_string(),
            window: Duration::from_millis(1000),
            ttl: Duration::from_secs(1),
            limit,
            record_rejected,
        }
    }

    #[tokio::test]
    async fn test_increment_arms_ttl_only_on_create() {
        let (clock, store) = store();

        let first = store
            .increment_counter("k", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.ttl, KeyTtl::Expires(Duration::from_secs(2)));

        clock.advance(Duration::from_millis(500));
        let second = store
            .increment_counter("k", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, KeyTtl::Expires(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_counter_expires() {
        let (clock, store) = store();
        store
            .increment_counter("k", Duration::from_secs(1))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.get_counter("k").await.unwrap(), None);
        assert_eq!(store.ttl("k").await.unwrap(), KeyTtl::Missing);

        let fresh = store
            .increment_counter("k", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(fresh.count, 1);
    }

    #[tokio::test]
    async fn test_log_prunes_before_counting() {
        let (clock, store) = store();

        assert_eq!(store.record_in_log("log", log_entry(START_MS, "a", 5, true)).await.unwrap(), 0);
        clock.advance(Duration::from_millis(400));
        assert_eq!(
            store.record_in_log("log", log_entry(START_MS + 400, "b", 5, true)).await.unwrap(),
            1
        );

        // Exactly one window after "a": it is pruned.
        clock.set(START_MS + 1000);
        assert_eq!(
            store.record_in_log("log", log_entry(START_MS + 1000, "c", 5, true)).await.unwrap(),
            1
        );
        assert_eq!(store.log_len("log").await, 2);
    }

    #[tokio::test]
    async fn test_log_skips_rejected_member_when_asked() {
        let (_clock, store) = store();

        store.record_in_log("log", log_entry(START_MS, "a", 1, false)).await.unwrap();
        let count = store.record_in_log("log", log_entry(START_MS, "b", 1, false)).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.log_len("log").await, 1);
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let (_clock, store) = store();
        store.insert_counter("k", 1, None).await;

        let result = store.record_in_log("k", log_entry(START_MS, "a", 1, true)).await;
        assert!(matches!(result, Err(StoreError::Command(_))));
    }

    #[tokio::test]
    async fn test_scan_reclaims_expired_entries() {
        let (clock, store) = store();
        for i in 0..1000 {
            store
                .increment_counter(&format!("rate_limit:ip-{i}"), Duration::from_secs(1))
                .await
                .unwrap();
        }
        store.insert_counter("other:persistent", 1, None).await;
        assert_eq!(store.len().await, 1001);

        clock.advance(Duration::from_secs(3600));
        let keys = store.scan_prefix("rate_limit:").await.unwrap();
        assert!(keys.is_empty());
        assert_eq!(store.len().await, 1);

        store
            .increment_counter("rate_limit:ip-0", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_scan_prefix_and_delete() {
        let (_clock, store) = store();
        store.insert_counter("rate_limit:a", 1, None).await;
        store
            .insert_counter("rate_limit:b", 1, Some(Duration::from_secs(5)))
            .await;
        store.insert_counter("other:c", 1, None).await;

        let keys = store.scan_prefix("rate_limit:").await.unwrap();
        assert_eq!(keys, vec!["rate_limit:a".to_string(), "rate_limit:b".to_string()]);
        assert_eq!(store.ttl("rate_limit:a").await.unwrap(), KeyTtl::Persistent);

        store.delete("rate_limit:a").await.unwrap();
        assert_eq!(store.get_counter("rate_limit:a").await.unwrap(), None);
    }
}
