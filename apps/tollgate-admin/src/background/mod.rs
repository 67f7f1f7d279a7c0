//! Background processing for the sweep daemon.

#[cfg(feature = "scheduler")]
pub mod scheduler;

#[cfg(feature = "scheduler")]
pub use scheduler::Scheduler;
