use serde::{Deserialize, Serialize};

/// Telemetry produced by every check, allowed or denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    /// Fully qualified store key used for the check.
    pub key: String,
    /// Requests consumed (fixed/sliding) or tokens available (token bucket).
    pub points: u64,
    pub remaining: u64,
    /// Epoch milliseconds at which the window or bucket state resets.
    pub expires_at: u64,
    /// Always equal to `expires_at`.
    pub reset_time: u64,
    /// True when this check created the stored state.
    pub is_first_request: bool,
}

impl RateLimitInfo {
    pub fn new(
        key: String,
        points: u64,
        remaining: u64,
        expires_at: u64,
        is_first_request: bool,
    ) -> Self {
        Self {
            key,
            points,
            remaining,
            expires_at,
            reset_time: expires_at,
            is_first_request,
        }
    }

    /// Milliseconds until reset as seen at `now_ms`, zero once passed.
    pub fn retry_after_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

/// Decision of a single rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed(RateLimitInfo),
    Denied(RateLimitInfo),
    /// The store could not be consulted; the check failed open.
    Indeterminate { reason: String },
}

impl RateLimitOutcome {
    /// Whether the protected operation may proceed.
    pub fn success(&self) -> bool {
        !matches!(self, RateLimitOutcome::Denied(_))
    }

    pub fn info(&self) -> Option<&RateLimitInfo> {
        match self {
            RateLimitOutcome::Allowed(info) | RateLimitOutcome::Denied(info) => Some(info),
            RateLimitOutcome::Indeterminate { .. } => None,
        }
    }

    pub fn into_info(self) -> Option<RateLimitInfo> {
        match self {
            RateLimitOutcome::Allowed(info) | RateLimitOutcome::Denied(info) => Some(info),
            RateLimitOutcome::Indeterminate { .. } => None,
        }
    }

    pub fn is_fail_open(&self) -> bool {
        matches!(self, RateLimitOutcome::Indeterminate { .. })
    }
}

/// Read-only view of a fixed-window counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSnapshot {
    pub key: String,
    pub points: u64,
    pub remaining: u64,
    /// `None` when the counter has no expiry armed.
    pub ttl_ms: Option<u64>,
    pub expires_at: Option<u64>,
}

/// Result of a stale-key sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: usize,
}
