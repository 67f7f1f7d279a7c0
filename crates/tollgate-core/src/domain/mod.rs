//! Domain types - options, algorithms, and the telemetry every check produces.

mod algorithm;
mod bucket;
mod info;
mod options;

pub use algorithm::Algorithm;
pub use bucket::{BucketOutcome, BucketRequest, BucketState, TOKENS_PER_REQUEST};
pub use info::{CleanupReport, LimitSnapshot, RateLimitInfo, RateLimitOutcome};
pub use options::{
    DEFAULT_KEY_PREFIX, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS, RateLimitOptions,
    RateLimitOverrides,
};
