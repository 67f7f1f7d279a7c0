//! # Tollgate Shared
//!
//! Wire-facing types shared between the limiter and the request guard that
//! sits in front of protected handlers.

pub mod dto;
pub mod headers;
pub mod response;

pub use dto::CheckResponse;
pub use headers::RateLimitHeaders;
pub use response::ErrorResponse;
