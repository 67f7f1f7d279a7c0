//! # Tollgate Infrastructure
//!
//! Concrete implementations of the counter store port defined in
//! `tollgate-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis-backed counter store shared across instances

pub mod store;

// Re-exports - In-Memory
pub use store::InMemoryCounterStore;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisCounterStore};
