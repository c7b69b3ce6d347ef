// Error types and error handling module
// This file defines the error taxonomy for configuration loading and
// the RabbitMQ management API fetch
//
// Numan Thabit 2025 Nov

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("read environment: {0}")]
    Source(#[from] config::ConfigError),
}

/// Failure of a single management API fetch. The cycle that triggered it is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch stream consumers from RabbitMQ API: {0}")]
    Request(#[source] reqwest::Error),
    #[error("failed to fetch stream consumers from RabbitMQ API: timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to fetch stream consumers from RabbitMQ API: HTTP {code}: {reason}")]
    Status { code: u16, reason: String },
    #[error("failed to fetch stream consumers from RabbitMQ API: invalid JSON body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("build management API client: {0}")]
    Client(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Request(err)
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        FetchError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}
