//! Errors produced while talking to the metadata service.

use std::time::Duration;

/// Errors that can occur during enrichment
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    /// Service unreachable (connect failure, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured per-attempt timeout
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl EnrichmentError {
    /// Build a status error from a response status code.
    pub fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Client errors (4xx other than 429) and malformed bodies are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::status(status)
        } else {
            Self::Network(e.to_string())
        }
    }
}
