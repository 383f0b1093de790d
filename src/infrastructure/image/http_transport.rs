//! reqwest-backed network transport.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::errors::TransportError;
use crate::domain::ports::ImageTransport;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Downloads image bytes over HTTP(S).
///
/// Timeouts are the only deadline in the image pipeline; nothing above the
/// transport imposes its own.
#[derive(Debug, Clone)]
pub struct HttpImageTransport {
    http_client: reqwest::Client,
}

impl HttpImageTransport {
    /// Creates a transport with the given request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(timeout_secs: u64) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::request(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageTransport for HttpImageTransport {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        debug!(url = %url, "Downloading image from network");

        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}
