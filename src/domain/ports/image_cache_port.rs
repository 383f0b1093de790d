//! Port definitions for image caching.

use async_trait::async_trait;

use crate::domain::entities::FetchHandle;
use crate::domain::errors::ImageResult;

/// Callback invoked exactly once, on the delivery context, with a fetch result.
pub type Completion = Box<dyn FnOnce(ImageResult) + Send + 'static>;

/// Contract the image cache exposes to the UI layer.
/// Implementations must be thread-safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Resolves `url` through memory, disk, then network, delivering the
    /// result to `completion`.
    ///
    /// Returns a handle only when a network fetch was started.
    async fn fetch_with(&self, url: &str, completion: Completion) -> Option<FetchHandle>;

    /// Cancels an in-flight fetch. Unknown or finished handles are ignored.
    fn cancel(&self, handle: FetchHandle);

    /// Warms the caches for every URL not already held in memory.
    async fn prefetch(&self, urls: &[String]);

    /// Empties the memory tier and the disk tier.
    async fn clear(&self);
}
