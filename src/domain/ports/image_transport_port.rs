//! Port definition for the network transport.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::TransportError;

/// Network collaborator able to GET the bytes behind a URL.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Downloads the body at `url`.
    async fn get(&self, url: &str) -> Result<Bytes, TransportError>;
}
