//! Standardized rejection body (RFC 7807 Problem Details).

use serde::{Deserialize, Serialize};

/// RFC 7807 Problem Details for HTTP APIs.
///
/// See: https://datatracker.ietf.org/doc/html/rfc7807
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// A URI reference that identifies the problem type.
    #[serde(rename = "type")]
    pub error_type: String,

    /// A short, human-readable summary of the problem type.
    pub title: String,

    /// The HTTP status code.
    pub status: u16,

    /// A human-readable explanation specific to this occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Quota left when the request was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,

    /// Reset time in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<u64>,

    /// Seconds the client should wait before retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorResponse {
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            error_type: "about:blank".to_string(),
            title: title.into(),
            status,
            detail: None,
            remaining: None,
            reset_time: None,
            retry_after: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 429 body for a denied check.
    pub fn too_many_requests(remaining: u64, reset_time: u64, retry_after: Option<u64>) -> Self {
        let detail = match retry_after {
            Some(secs) => format!("Rate limit exceeded. Try again in {secs} seconds."),
            None => "Rate limit exceeded.".to_string(),
        };

        let mut response = Self::new(429, "Too Many Requests").with_detail(detail);
        response.remaining = Some(remaining);
        response.reset_time = Some(reset_time);
        response.retry_after = retry_after;
        response
    }
}
