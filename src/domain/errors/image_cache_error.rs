//! Image cache error types.

use thiserror::Error;

use crate::domain::entities::LoadedImage;

/// Failure reported by the network transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum TransportError {
    #[error("could not connect: {message}")]
    Connect { message: String },

    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("server responded with HTTP {status}")]
    Status { status: u16 },

    #[error("failed to read response body: {message}")]
    Body { message: String },

    #[error("request failed: {message}")]
    Request { message: String },
}

impl TransportError {
    /// Creates a request error.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Returns whether the host could not be reached at all.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = e.to_string();
        if e.is_timeout() {
            Self::Timeout { message }
        } else if e.is_connect() {
            Self::Connect { message }
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else if e.is_body() || e.is_decode() {
            Self::Body { message }
        } else {
            Self::Request { message }
        }
    }
}

/// Errors delivered to `fetch` callers.
///
/// Disk failures never appear here: the disk tier is an optimization and its
/// errors degrade to cache misses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageCacheError {
    /// Bytes were retrieved but could not be decoded as an image.
    #[error("retrieved bytes are not a valid image")]
    InvalidImageData,

    /// The transport reported an error.
    #[error("image download failed: {0}")]
    DownloadFailed(#[from] TransportError),
}

impl ImageCacheError {
    /// Returns whether the failure came from the network.
    #[must_use]
    pub const fn is_download_failure(&self) -> bool {
        matches!(self, Self::DownloadFailed(_))
    }
}

/// Result type delivered to fetch completions.
pub type ImageResult = Result<LoadedImage, ImageCacheError>;
