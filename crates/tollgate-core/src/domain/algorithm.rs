use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LimiterError;

/// Rate limiting algorithm selectable per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Calendar-aligned counter, reset when its TTL lapses.
    #[default]
    #[serde(rename = "fixed")]
    FixedWindow,
    /// Timestamp log over a rolling interval.
    SlidingWindow,
    /// Continuously refilling bucket of tokens.
    TokenBucket,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::FixedWindow,
        Algorithm::SlidingWindow,
        Algorithm::TokenBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "fixed",
            Algorithm::SlidingWindow => "sliding_window",
            Algorithm::TokenBucket => "token_bucket",
        }
    }

    /// Namespace segment between the prefix and the caller key.
    fn segment(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "",
            Algorithm::SlidingWindow => "sliding:",
            Algorithm::TokenBucket => "token:",
        }
    }

    /// Fully qualified store key for `key` under `prefix`.
    pub fn store_key(&self, prefix: &str, key: &str) -> String {
        format!("{}{}{}", prefix, self.segment(), key)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LimiterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Algorithm::FixedWindow),
            "sliding_window" => Ok(Algorithm::SlidingWindow),
            "token_bucket" => Ok(Algorithm::TokenBucket),
            other => Err(LimiterError::UnknownAlgorithm(other.to_string())),
        }
    }
}
