//! Limiter-level error types.

use thiserror::Error;

use crate::ports::StoreError;

/// Errors surfaced by the rate limiter itself.
///
/// Store failures during a limit check never show up here; they are turned
/// into [`RateLimitOutcome::Indeterminate`](crate::domain::RateLimitOutcome).
/// Maintenance operations do propagate them.
#[derive(Debug, Error)]
pub enum LimiterError {
    #[error("Invalid rate limit options: {0}")]
    InvalidOptions(String),

    #[error("Unknown rate limit algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),
}
