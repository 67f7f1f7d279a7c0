//! Data Transfer Objects - serialisable views of limiter results.

use serde::{Deserialize, Serialize};

use tollgate_core::{Algorithm, RateLimitInfo, RateLimitOutcome};

use crate::headers::RateLimitHeaders;
use crate::response::ErrorResponse;

/// Everything a guard needs to answer a checked request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub success: bool,
    /// The store was unavailable and the check failed open.
    pub fail_open: bool,
    pub algorithm: Algorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<RateLimitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<RateLimitHeaders>,
    /// Rejection body, present only on denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl CheckResponse {
    pub fn from_outcome(outcome: RateLimitOutcome, algorithm: Algorithm, now_ms: u64) -> Self {
        let success = outcome.success();
        let fail_open = outcome.is_fail_open();
        let info = outcome.into_info();
        let headers = info
            .as_ref()
            .map(|info| RateLimitHeaders::from_info(info, now_ms));

        let error = match (&info, &headers) {
            (Some(info), Some(headers)) if !success => Some(ErrorResponse::too_many_requests(
                info.remaining,
                info.reset_time,
                headers.retry_after,
            )),
            _ => None,
        };

        Self {
            success,
            fail_open,
            algorithm,
            info,
            headers,
            error,
        }
    }
}
