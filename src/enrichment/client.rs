//! Metadata service HTTP client
//!
//! Fetches release date, lyric text and link for a `(group, song)` pair from
//! `GET {base_url}/info?group=..&song=..`.
//!
//! Every attempt has a hard timeout. Retryable failures (connect errors,
//! timeouts, 429 and 5xx) are retried with exponential backoff up to
//! `max_retries` extra attempts; anything else fails immediately.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{debug, warn};

use crate::config::MetadataConfig;
use crate::enrichment::domain::EnrichmentError;
use crate::model::SongDetail;

/// Metadata service client
pub struct MetadataClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: usize,
    min_backoff: Duration,
}

impl MetadataClient {
    /// Create a client from configuration.
    ///
    /// The client is configured to:
    /// - Abort each attempt after `timeout_secs`
    /// - Accept gzip-compressed responses
    /// - Send a User-Agent header identifying the service
    pub fn new(config: &MetadataConfig) -> Result<Self, EnrichmentError> {
        let timeout = config.timeout();
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries: config.max_retries,
            min_backoff: Duration::from_millis(200),
        })
    }

    /// Create a client for testing with custom base URL and short backoff
    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration, max_retries: usize) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
            timeout,
            max_retries,
            min_backoff: Duration::from_millis(10),
        }
    }

    /// Fetch enrichment data for a song, retrying transient failures.
    pub async fn fetch_detail(
        &self,
        group: &str,
        song: &str,
    ) -> Result<SongDetail, EnrichmentError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.min_backoff)
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries);

        (|| self.send_info_request(group, song))
            .retry(backoff)
            .when(EnrichmentError::is_retryable)
            .notify(|err, delay| {
                warn!(group, song, error = %err, ?delay, "Metadata request failed, retrying");
            })
            .await
    }

    /// Send one request and decode the response
    async fn send_info_request(
        &self,
        group: &str,
        song: &str,
    ) -> Result<SongDetail, EnrichmentError> {
        let url = format!("{}/info", self.base_url);
        debug!(%url, group, song, "Requesting song detail");

        let response = self
            .http_client
            .get(&url)
            .query(&[("group", group), ("song", song)])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::status(status));
        }

        response
            .json::<SongDetail>()
            .await
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, e: reqwest::Error) -> EnrichmentError {
        if e.is_timeout() {
            EnrichmentError::Timeout(self.timeout)
        } else {
            EnrichmentError::from(e)
        }
    }
}
