//! # Tollgate Core
//!
//! The rate limiting layer of Tollgate: fixed window, sliding window log and
//! token bucket algorithms over an abstract atomic counter store.
//! This crate contains no I/O; store adapters live in `tollgate-infra`.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use domain::{Algorithm, RateLimitInfo, RateLimitOptions, RateLimitOutcome, RateLimitOverrides};
pub use error::LimiterError;
pub use limiter::RateLimiter;
