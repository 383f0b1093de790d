//! Image cache service.
//!
//! Resolves a URL through three tiers: Memory -> Disk -> Network. Network
//! fetches run as independent tasks tracked in an in-flight table so callers
//! can cancel them; every result is delivered through the [`MainQueue`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, trace, warn};

use crate::domain::entities::{CacheKey, FetchHandle, ImageSource, LoadedImage, SharedImage};
use crate::domain::errors::{ImageCacheError, ImageResult, TransportError};
use crate::domain::ports::{Completion, ImageCachePort, ImageTransport};
use crate::infrastructure::config::CacheConfig;

use super::disk_cache::DiskImageCache;
use super::http_transport::HttpImageTransport;
use super::main_queue::MainQueue;
use super::memory_cache::{CacheStats, MemoryImageCache};

type InFlightTable = RwLock<HashMap<FetchHandle, AbortHandle>>;

/// Errors raised while constructing the service.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// The disk cache directory could not be created.
    #[error("failed to open disk cache: {0}")]
    Disk(#[from] std::io::Error),
    /// The default HTTP transport could not be built.
    #[error("failed to build transport: {0}")]
    Transport(#[from] TransportError),
}

/// Future resolving to the result of a [`ImageCacheService::fetch`].
///
/// Resolves to `None` when the fetch was cancelled before delivering.
#[derive(Debug)]
pub struct PendingImage {
    result_rx: oneshot::Receiver<ImageResult>,
}

impl Future for PendingImage {
    type Output = Option<ImageResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result_rx).poll(cx).map(Result::ok)
    }
}

/// Two-tier image cache with cancellable network fetches.
///
/// Cheap to clone; clones share tiers, in-flight table and delivery queue.
#[derive(Clone)]
pub struct ImageCacheService {
    memory_cache: Arc<MemoryImageCache>,
    disk_cache: Arc<DiskImageCache>,
    in_flight: Arc<InFlightTable>,
    transport: Arc<dyn ImageTransport>,
    main_queue: MainQueue,
}

impl std::fmt::Debug for ImageCacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCacheService")
            .field("cache_dir", &self.disk_cache.cache_dir())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl ImageCacheService {
    /// Assembles a service from explicit parts.
    #[must_use]
    pub fn new(
        config: &CacheConfig,
        disk_cache: DiskImageCache,
        transport: Arc<dyn ImageTransport>,
        main_queue: MainQueue,
    ) -> Self {
        Self {
            memory_cache: Arc::new(MemoryImageCache::new(
                config.memory_count_limit,
                config.memory_cost_limit,
            )),
            disk_cache: Arc::new(disk_cache),
            in_flight: Arc::new(RwLock::new(HashMap::new())),
            transport,
            main_queue,
        }
    }

    /// Opens the disk tier at the configured directory and assembles the
    /// service around `transport` and `main_queue`.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub async fn open(
        config: &CacheConfig,
        transport: Arc<dyn ImageTransport>,
        main_queue: MainQueue,
    ) -> Result<Self, ServiceInitError> {
        let disk_cache = DiskImageCache::new(config.effective_cache_dir()).await?;
        Ok(Self::new(config, disk_cache, transport, main_queue))
    }

    /// Creates a service with the HTTP transport and a freshly spawned
    /// delivery queue.
    ///
    /// # Errors
    /// Returns error if the cache directory or HTTP client cannot be created.
    pub async fn with_http(config: &CacheConfig) -> Result<Self, ServiceInitError> {
        let transport = Arc::new(HttpImageTransport::new(config.request_timeout_secs)?);
        Self::open(config, transport, MainQueue::spawn()).await
    }

    /// Delivery queue completions run on.
    #[must_use]
    pub const fn main_queue(&self) -> &MainQueue {
        &self.main_queue
    }

    /// Resolves `url` and returns the handle (network path only) together
    /// with a future for the result.
    pub async fn fetch(&self, url: &str) -> (Option<FetchHandle>, PendingImage) {
        let (result_tx, result_rx) = oneshot::channel();
        let handle = self
            .fetch_with(url, move |result| {
                let _ = result_tx.send(result);
            })
            .await;
        (handle, PendingImage { result_rx })
    }

    /// Resolves `url`, delivering the result to `completion` on the main
    /// queue.
    ///
    /// Returns a handle only when a network fetch was started; the handle is
    /// returned before that fetch completes.
    pub async fn fetch_with<F>(&self, url: &str, completion: F) -> Option<FetchHandle>
    where
        F: FnOnce(ImageResult) + Send + 'static,
    {
        let key = CacheKey::new(url);

        if let Some(image) = self.memory_cache.get(&key) {
            self.deliver(completion, loaded(key, image, ImageSource::Memory));
            return None;
        }

        if let Some(image) = self.read_disk(&key).await {
            self.memory_cache.put(key.clone(), image.clone());
            self.deliver(completion, loaded(key, image, ImageSource::Disk));
            return None;
        }

        let handle = FetchHandle::generate();
        let task = FetchTask {
            memory_cache: self.memory_cache.clone(),
            disk_cache: self.disk_cache.clone(),
            in_flight: self.in_flight.clone(),
            transport: self.transport.clone(),
            main_queue: self.main_queue.clone(),
        };

        {
            // Held across the spawn so the task cannot finish and remove its
            // entry before the entry exists.
            let mut in_flight = self.in_flight.write();
            let join = tokio::spawn(task.run(handle, key.clone(), completion));
            in_flight.insert(handle, join.abort_handle());
        }

        debug!(key = %key, handle = %handle, "Started network fetch");
        Some(handle)
    }

    /// Cancels an in-flight fetch.
    ///
    /// Unknown handles, including those already completed or cancelled and
    /// those never issued, are ignored.
    pub fn cancel(&self, handle: FetchHandle) {
        let removed = self.in_flight.write().remove(&handle);
        if let Some(abort) = removed {
            abort.abort();
            debug!(handle = %handle, "Cancelled image fetch");
        } else {
            trace!(handle = %handle, "Cancel for unknown handle ignored");
        }
    }

    /// Starts fetches for every URL not already held in memory, discarding
    /// the results.
    pub async fn prefetch(&self, urls: &[String]) {
        let mut started = 0usize;
        for url in urls {
            if self.memory_cache.contains(&CacheKey::new(url.as_str())) {
                continue;
            }
            let _ = self.fetch_with(url, |_| {}).await;
            started += 1;
        }
        debug!(requested = urls.len(), started, "Prefetch issued");
    }

    /// Empties the memory tier and recreates the disk directory.
    ///
    /// In-flight fetches are left alone and may write through afterwards.
    pub async fn clear(&self) {
        self.memory_cache.clear();
        if let Err(e) = self.disk_cache.clear().await {
            warn!(error = %e, "Failed to clear disk cache");
        }
        info!("Cleared all image caches");
    }

    /// Number of outstanding network fetches.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.read().len()
    }

    /// Returns true while `handle` refers to an outstanding fetch.
    #[must_use]
    pub fn is_in_flight(&self, handle: FetchHandle) -> bool {
        self.in_flight.read().contains_key(&handle)
    }

    /// Returns true if `url` is held in the memory tier.
    #[must_use]
    pub fn contains_in_memory(&self, url: &str) -> bool {
        self.memory_cache.contains(&CacheKey::new(url))
    }

    /// Returns memory tier statistics.
    #[must_use]
    pub fn memory_stats(&self) -> CacheStats {
        self.memory_cache.stats()
    }

    fn deliver<F>(&self, completion: F, result: ImageResult)
    where
        F: FnOnce(ImageResult) + Send + 'static,
    {
        self.main_queue.dispatch(move || completion(result));
    }

    async fn read_disk(&self, key: &CacheKey) -> Option<SharedImage> {
        let bytes = self.disk_cache.get_bytes(key).await?;
        match decode(bytes).await {
            Ok(image) => {
                debug!(key = %key, "Decoded image from disk cache");
                Some(image)
            }
            Err(_) => {
                warn!(key = %key, "Disk cache entry is not a valid image, treating as miss");
                None
            }
        }
    }
}

#[async_trait]
impl ImageCachePort for ImageCacheService {
    async fn fetch_with(&self, url: &str, completion: Completion) -> Option<FetchHandle> {
        Self::fetch_with(self, url, completion).await
    }

    fn cancel(&self, handle: FetchHandle) {
        Self::cancel(self, handle);
    }

    async fn prefetch(&self, urls: &[String]) {
        Self::prefetch(self, urls).await;
    }

    async fn clear(&self) {
        Self::clear(self).await;
    }
}

/// State moved into a spawned network fetch.
struct FetchTask {
    memory_cache: Arc<MemoryImageCache>,
    disk_cache: Arc<DiskImageCache>,
    in_flight: Arc<InFlightTable>,
    transport: Arc<dyn ImageTransport>,
    main_queue: MainQueue,
}

impl FetchTask {
    async fn run<F>(self, handle: FetchHandle, key: CacheKey, completion: F)
    where
        F: FnOnce(ImageResult) + Send + 'static,
    {
        let result = self.download(&key).await;

        self.in_flight.write().remove(&handle);

        match &result {
            Ok(_) => debug!(key = %key, handle = %handle, source = "network", "Image loaded successfully"),
            Err(e) => warn!(key = %key, handle = %handle, error = %e, "Image fetch failed"),
        }

        self.main_queue.dispatch(move || completion(result));
    }

    async fn download(&self, key: &CacheKey) -> ImageResult {
        let bytes = self.transport.get(key.as_str()).await?;

        let image = decode(bytes.clone()).await?;

        self.memory_cache.put(key.clone(), image.clone());

        // The write runs as its own task so cancelling the fetch cannot
        // interrupt it halfway.
        let disk_cache = self.disk_cache.clone();
        let key_for_disk = key.clone();
        let write = tokio::spawn(async move {
            if let Err(e) = disk_cache.put_bytes(&key_for_disk, &bytes).await {
                warn!(key = %key_for_disk, error = %e, "Failed to cache to disk");
            }
        });
        if let Err(e) = write.await {
            error!(key = %key, error = %e, "Disk write task panicked");
        }

        loaded(key.clone(), image, ImageSource::Network)
    }
}

fn loaded(key: CacheKey, image: SharedImage, source: ImageSource) -> ImageResult {
    Ok(LoadedImage { key, image, source })
}

/// Decodes image bytes on the blocking pool.
async fn decode(bytes: impl AsRef<[u8]> + Send + 'static) -> Result<SharedImage, ImageCacheError> {
    match tokio::task::spawn_blocking(move || image::load_from_memory(bytes.as_ref())).await {
        Ok(Ok(image)) => Ok(Arc::new(image)),
        Ok(Err(e)) => {
            debug!(error = %e, "Failed to decode image");
            Err(ImageCacheError::InvalidImageData)
        }
        Err(e) => {
            error!(error = %e, "Decode task panicked");
            Err(ImageCacheError::InvalidImageData)
        }
    }
}
