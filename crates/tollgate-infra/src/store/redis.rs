//! Redis counter store.
//!
//! Fixed window uses a Lua `INCR`/`EXPIRE`, the sliding window log a
//! `MULTI` pipeline over a sorted set, and the token bucket a Lua script over
//! a hash. Every trait method is a single atomic unit on the server.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, RedisResult, Script};

use tollgate_core::domain::{BucketOutcome, BucketRequest};
use tollgate_core::ports::{CounterSnapshot, CounterStore, KeyTtl, LogEntry, StoreError};

/// Keys fetched per `SCAN` round trip.
const SCAN_BATCH: usize = 100;

/// Returns: [current_count, pttl_ms]
const INCREMENT_SCRIPT: &str = r#"
local key = KEYS[1]
local window_secs = tonumber(ARGV[1])

local current = redis.call('INCR', key)
if current == 1 then
    redis.call('EXPIRE', key, window_secs)
end

return {current, redis.call('PTTL', key)}
"#;

/// Conditional variant of the log append: only admitted requests are recorded.
/// Returns the pre-add count.
const LOG_ADMITTED_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local cutoff = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local member = ARGV[4]
local ttl = tonumber(ARGV[5])

redis.call('ZREMRANGEBYSCORE', key, '-inf', cutoff)
local count = redis.call('ZCARD', key)
if count < limit then
    redis.call('ZADD', key, now, member)
end
redis.call('EXPIRE', key, ttl)

return count
"#;

/// Mirrors `BucketState::step`. Tokens are returned as a string because Lua
/// numbers are truncated to integers on the way out.
/// Returns: [allowed, tokens, created]
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local state = redis.call('HMGET', key, 'tokens', 'lastRefill')
local tokens = tonumber(state[1])
local last_refill = tonumber(state[2])
local created = 0
if tokens == nil or last_refill == nil then
    tokens = capacity
    last_refill = now
    created = 1
end

local elapsed = math.max(0, now - last_refill)
tokens = math.max(0, math.min(capacity, tokens + elapsed * refill_rate))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'lastRefill', tostring(math.max(now, last_refill)))
redis.call('EXPIRE', key, ttl)

return {allowed, tostring(tokens), created}
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Upper bound on a single store operation; exceeding it fails the check open
    pub command_timeout: Duration,
    /// Whether to fallback to the in-memory store if Redis is unavailable at startup
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_millis(500),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            command_timeout: Duration::from_millis(
                std::env::var("REDIS_COMMAND_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis-backed counter store shared by every limiter instance.
///
/// Uses connection manager for automatic reconnection.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    config: RedisConfig,
    increment_script: Script,
    log_admitted_script: Script,
    token_bucket_script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %config.url, "Connected to Redis counter store");

        Ok(Self {
            conn,
            config,
            increment_script: Script::new(INCREMENT_SCRIPT),
            log_admitted_script: Script::new(LOG_ADMITTED_SCRIPT),
            token_bucket_script: Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(RedisConfig::from_env()).await
    }

    /// Await a Redis call under the command timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_redis_error(e, self.config.command_timeout)),
            Err(_) => Err(StoreError::Timeout(self.config.command_timeout)),
        }
    }
}

/// Timeouts are checked first: a client-side timeout is also an I/O error.
fn map_redis_error(e: RedisError, command_timeout: Duration) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout(command_timeout)
    } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn glob_escape(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get_counter(&self, key: &str) -> Result<Option<CounterSnapshot>, StoreError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.get(key).pttl(key);

        let (count, pttl): (Option<u64>, i64) = self.bounded(pipe.query_async(&mut conn)).await?;

        Ok(count.map(|count| CounterSnapshot {
            count,
            ttl: KeyTtl::from_pttl(pttl),
        }))
    }

    async fn increment_counter(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<CounterSnapshot, StoreError> {
        let mut conn = self.conn.clone();

        let result: Vec<i64> = self
            .bounded(
                self.increment_script
                    .key(key)
                    .arg(ttl.as_secs().max(1))
                    .invoke_async(&mut conn),
            )
            .await?;

        match result.as_slice() {
            [count, pttl] if *count > 0 => Ok(CounterSnapshot {
                count: *count as u64,
                ttl: KeyTtl::from_pttl(*pttl),
            }),
            other => Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("unexpected increment reply {other:?}"),
            }),
        }
    }

    async fn record_in_log(&self, key: &str, entry: LogEntry) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let ttl_secs = entry.ttl.as_secs().max(1);

        if !entry.record_rejected {
            let count: u64 = self
                .bounded(
                    self.log_admitted_script
                        .key(key)
                        .arg(entry.now_ms)
                        .arg(entry.cutoff_ms())
                        .arg(entry.limit)
                        .arg(&entry.member)
                        .arg(ttl_secs)
                        .invoke_async(&mut conn),
                )
                .await?;
            return Ok(count);
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(entry.cutoff_ms())
            .ignore()
            .zcard(key)
            .zadd(key, &entry.member, entry.now_ms)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore();

        let (count,): (u64,) = self.bounded(pipe.query_async(&mut conn)).await?;
        Ok(count)
    }

    async fn take_token(
        &self,
        key: &str,
        request: BucketRequest,
    ) -> Result<BucketOutcome, StoreError> {
        let mut conn = self.conn.clone();

        let (allowed, tokens, created): (i64, String, i64) = self
            .bounded(
                self.token_bucket_script
                    .key(key)
                    .arg(request.capacity)
                    .arg(request.refill_per_sec)
                    .arg(request.now_secs)
                    .arg(request.ttl.as_secs().max(1))
                    .invoke_async(&mut conn),
            )
            .await?;

        let tokens: f64 = tokens.parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("token count {tokens:?} is not a number"),
        })?;

        Ok(BucketOutcome {
            allowed: allowed == 1,
            tokens,
            created: created == 1,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        self.bounded(conn.del::<_, ()>(key)).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        let mut conn = self.conn.clone();
        let pttl: i64 = self.bounded(conn.pttl(key)).await?;
        Ok(KeyTtl::from_pttl(pttl))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", glob_escape(prefix));
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .bounded(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
