//! Admin command errors.

use thiserror::Error;

use tollgate_core::LimiterError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Limiter(#[from] LimiterError),

    #[cfg(feature = "scheduler")]
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Output encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Signal handling failed: {0}")]
    Io(#[from] std::io::Error),
}
