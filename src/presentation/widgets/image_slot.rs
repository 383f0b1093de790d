//! Reuse-safe binding of remote images to a visual slot.
//!
//! A slot (a list cell's image area, a header avatar) can be rebound to a
//! different item while a fetch for the previous item is still outstanding.
//! Each bind advances a per-slot generation number that the completion
//! captures by value; a completion whose generation no longer matches is
//! dropped, whatever it carries.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::{FetchHandle, SharedImage};
use crate::domain::errors::{ImageCacheError, ImageResult};
use crate::domain::ports::{Completion, ImageCachePort};

/// What a slot is currently showing.
#[derive(Debug, Clone, Default)]
pub enum SlotContent {
    /// Nothing at all.
    #[default]
    Empty,
    /// The placeholder supplied to the latest bind.
    Placeholder(SharedImage),
    /// A fetched image.
    Image(SharedImage),
}

impl SlotContent {
    fn placeholder(placeholder: Option<SharedImage>) -> Self {
        placeholder.map_or(Self::Empty, Self::Placeholder)
    }

    /// Returns the image to draw, if any.
    #[must_use]
    pub const fn image(&self) -> Option<&SharedImage> {
        match self {
            Self::Empty => None,
            Self::Placeholder(image) | Self::Image(image) => Some(image),
        }
    }

    /// Returns true unless a fetched image is shown.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Image(_))
    }
}

#[derive(Debug, Default)]
struct BindingState {
    generation: u64,
    current_request_id: Option<u64>,
    current_fetch_handle: Option<FetchHandle>,
    content: SlotContent,
}

/// Binding coordinator for one visual slot.
pub struct ImageSlot {
    cache: Arc<dyn ImageCachePort>,
    state: Arc<Mutex<BindingState>>,
}

impl std::fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ImageSlot")
            .field("request_id", &state.current_request_id)
            .field("fetch_handle", &state.current_fetch_handle)
            .field("content", &state.content)
            .finish_non_exhaustive()
    }
}

impl ImageSlot {
    /// Creates an unbound, empty slot backed by `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn ImageCachePort>) -> Self {
        Self {
            cache,
            state: Arc::new(Mutex::new(BindingState::default())),
        }
    }

    /// Shows `placeholder` and starts loading `url` into this slot,
    /// superseding any earlier bind.
    ///
    /// With `url` set to `None` the slot just shows the placeholder.
    pub async fn bind(&self, url: Option<&str>, placeholder: Option<SharedImage>) {
        let (previous, request_id) = {
            let mut state = self.state.lock();
            let previous = state.current_fetch_handle.take();
            state.generation += 1;
            state.current_request_id = Some(state.generation);
            state.content = SlotContent::placeholder(placeholder);
            (previous, state.generation)
        };

        if let Some(handle) = previous {
            self.cache.cancel(handle);
        }

        let Some(url) = url else {
            trace!(request_id, "Bound slot to placeholder only");
            return;
        };

        let completion = Self::completion(Arc::downgrade(&self.state), request_id);
        let handle = self.cache.fetch_with(url, completion).await;

        if let Some(handle) = handle {
            let mut state = self.state.lock();
            if state.current_request_id == Some(request_id) {
                state.current_fetch_handle = Some(handle);
            } else {
                // Rebound while the fetch was being set up.
                drop(state);
                self.cache.cancel(handle);
            }
        }
    }

    /// Detaches the slot: any outstanding completion will be discarded and
    /// the in-flight fetch, if any, is cancelled. The content is left as is.
    pub fn unbind(&self) {
        let previous = {
            let mut state = self.state.lock();
            state.current_request_id = None;
            state.current_fetch_handle.take()
        };

        if let Some(handle) = previous {
            self.cache.cancel(handle);
        }
    }

    /// Current content of the slot.
    #[must_use]
    pub fn content(&self) -> SlotContent {
        self.state.lock().content.clone()
    }

    /// Returns true unless a fetched image is shown.
    #[must_use]
    pub fn is_showing_placeholder(&self) -> bool {
        self.state.lock().content.is_placeholder()
    }

    /// Identifier of the latest bind, `None` when unbound.
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        self.state.lock().current_request_id
    }

    /// Handle of the latest bind's network fetch, if one was started.
    #[must_use]
    pub fn fetch_handle(&self) -> Option<FetchHandle> {
        self.state.lock().current_fetch_handle
    }

    fn completion(state: Weak<Mutex<BindingState>>, request_id: u64) -> Completion {
        Box::new(move |result: ImageResult| {
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock();

            if state.current_request_id != Some(request_id) {
                trace!(request_id, current = ?state.current_request_id, "Discarding stale image result");
                return;
            }

            match result {
                Ok(loaded) => {
                    trace!(request_id, key = %loaded.key, source = %loaded.source, "Applying image to slot");
                    state.content = SlotContent::Image(loaded.image);
                }
                Err(ImageCacheError::DownloadFailed(e)) if e.is_unreachable() => {
                    warn!(request_id, error = %e, "Image host unreachable, keeping placeholder");
                }
                Err(e) => {
                    debug!(request_id, error = %e, "Failed to load image, keeping placeholder");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CacheKey, ImageSource, LoadedImage};
    use crate::domain::errors::TransportError;
    use crate::domain::ports::mocks::MockImageCachePort;
    use mockall::predicate::eq;

    const URL_A: &str = "https://x/a.png";
    const URL_B: &str = "https://x/b.png";

    type Stash = Arc<Mutex<Vec<(String, Completion)>>>;

    fn image(side: u32) -> SharedImage {
        Arc::new(image::DynamicImage::new_rgb8(side, side))
    }

    fn loaded(url: &str, image: &SharedImage) -> ImageResult {
        Ok(LoadedImage {
            key: CacheKey::new(url),
            image: image.clone(),
            source: ImageSource::Network,
        })
    }

    /// Mock that stashes every completion and hands out the given handles in
    /// order.
    fn stashing_mock(handles: Vec<Option<FetchHandle>>) -> (MockImageCachePort, Stash) {
        let stash: Stash = Arc::new(Mutex::new(Vec::new()));
        let mut mock = MockImageCachePort::new();
        let sink = stash.clone();
        let mut handles = handles.into_iter();
        mock.expect_fetch_with()
            .returning(move |url: &str, completion: Completion| {
                sink.lock().push((url.to_string(), completion));
                handles.next().flatten()
            });
        (mock, stash)
    }

    fn take_completion(stash: &Stash, index: usize) -> Completion {
        let mut stash = stash.lock();
        let placeholder: Completion = Box::new(|_| {});
        std::mem::replace(&mut stash[index].1, placeholder)
    }

    fn shows(slot: &ImageSlot, expected: &SharedImage) -> bool {
        slot.content()
            .image()
            .is_some_and(|shown| Arc::ptr_eq(shown, expected))
    }

    #[tokio::test]
    async fn test_bind_without_url_shows_placeholder_only() {
        let mock = MockImageCachePort::new();
        let slot = ImageSlot::new(Arc::new(mock));
        let placeholder = image(1);

        slot.bind(None, Some(placeholder.clone())).await;

        assert!(shows(&slot, &placeholder));
        assert!(slot.is_showing_placeholder());
        assert!(slot.fetch_handle().is_none());
        assert_eq!(slot.request_id(), Some(1));
    }

    #[tokio::test]
    async fn test_successful_completion_replaces_placeholder() {
        let h1 = FetchHandle::generate();
        let (mock, stash) = stashing_mock(vec![Some(h1)]);
        let slot = ImageSlot::new(Arc::new(mock));
        let placeholder = image(1);
        let fetched = image(8);

        slot.bind(Some(URL_A), Some(placeholder.clone())).await;
        assert!(shows(&slot, &placeholder));
        assert_eq!(slot.fetch_handle(), Some(h1));

        take_completion(&stash, 0)(loaded(URL_A, &fetched));

        assert!(shows(&slot, &fetched));
        assert!(!slot.is_showing_placeholder());
    }

    #[tokio::test]
    async fn test_rebind_cancels_and_discards_superseded_result() {
        let h1 = FetchHandle::generate();
        let h2 = FetchHandle::generate();
        let (mut mock, stash) = stashing_mock(vec![Some(h1), Some(h2)]);
        mock.expect_cancel().with(eq(h1)).times(1).return_const(());
        let slot = ImageSlot::new(Arc::new(mock));
        let placeholder = image(1);
        let image_a = image(2);
        let image_b = image(3);

        slot.bind(Some(URL_A), Some(placeholder.clone())).await;
        let r1 = slot.request_id();
        slot.bind(Some(URL_B), Some(placeholder.clone())).await;

        assert_ne!(slot.request_id(), r1);
        assert_eq!(slot.fetch_handle(), Some(h2));
        assert_eq!(stash.lock()[1].0, URL_B);

        // A resolves late and successfully: must not show.
        take_completion(&stash, 0)(loaded(URL_A, &image_a));
        assert!(shows(&slot, &placeholder));

        take_completion(&stash, 1)(loaded(URL_B, &image_b));
        assert!(shows(&slot, &image_b));
    }

    #[tokio::test]
    async fn test_late_result_after_newer_one_is_discarded() {
        let h1 = FetchHandle::generate();
        let h2 = FetchHandle::generate();
        let (mut mock, stash) = stashing_mock(vec![Some(h1), Some(h2)]);
        mock.expect_cancel().return_const(());
        let slot = ImageSlot::new(Arc::new(mock));
        let image_a = image(2);
        let image_b = image(3);

        slot.bind(Some(URL_A), None).await;
        slot.bind(Some(URL_B), None).await;

        take_completion(&stash, 1)(loaded(URL_B, &image_b));
        take_completion(&stash, 0)(loaded(URL_A, &image_a));

        assert!(shows(&slot, &image_b));
    }

    #[tokio::test]
    async fn test_rebind_to_same_url_discards_first_request() {
        let (mut mock, stash) = stashing_mock(vec![None, None]);
        mock.expect_cancel().never();
        let slot = ImageSlot::new(Arc::new(mock));
        let first = image(2);
        let second = image(3);

        slot.bind(Some(URL_A), None).await;
        let r1 = slot.request_id();
        slot.bind(Some(URL_A), None).await;
        assert_ne!(slot.request_id(), r1);

        take_completion(&stash, 0)(loaded(URL_A, &first));
        assert!(matches!(slot.content(), SlotContent::Empty));

        take_completion(&stash, 1)(loaded(URL_A, &second));
        assert!(shows(&slot, &second));
    }

    #[tokio::test]
    async fn test_failure_keeps_placeholder() {
        let (mut mock, stash) = stashing_mock(vec![Some(FetchHandle::generate()), None]);
        mock.expect_cancel().return_const(());
        let slot = ImageSlot::new(Arc::new(mock));
        let placeholder = image(1);

        slot.bind(Some(URL_A), Some(placeholder.clone())).await;
        take_completion(&stash, 0)(Err(ImageCacheError::DownloadFailed(
            TransportError::Connect {
                message: "dns lookup failed".into(),
            },
        )));
        assert!(shows(&slot, &placeholder));

        slot.bind(Some(URL_B), Some(placeholder.clone())).await;
        take_completion(&stash, 1)(Err(ImageCacheError::InvalidImageData));
        assert!(shows(&slot, &placeholder));
        assert!(slot.is_showing_placeholder());
    }

    #[tokio::test]
    async fn test_stale_cache_hit_is_also_checked() {
        // Cache hits carry no handle, so nothing is cancelled on rebind.
        let (mut mock, stash) = stashing_mock(vec![None, None]);
        mock.expect_cancel().never();
        let slot = ImageSlot::new(Arc::new(mock));
        let image_a = image(2);

        slot.bind(Some(URL_A), None).await;
        slot.bind(None, None).await;

        take_completion(&stash, 0)(loaded(URL_A, &image_a));
        assert!(matches!(slot.content(), SlotContent::Empty));
    }

    #[tokio::test]
    async fn test_unbind_cancels_and_discards() {
        let h1 = FetchHandle::generate();
        let (mut mock, stash) = stashing_mock(vec![Some(h1)]);
        mock.expect_cancel().with(eq(h1)).times(1).return_const(());
        let slot = ImageSlot::new(Arc::new(mock));
        let placeholder = image(1);

        slot.bind(Some(URL_A), Some(placeholder.clone())).await;
        slot.unbind();

        assert!(slot.request_id().is_none());
        assert!(slot.fetch_handle().is_none());

        take_completion(&stash, 0)(loaded(URL_A, &image(4)));
        assert!(shows(&slot, &placeholder));

        // Nothing left to cancel.
        slot.unbind();
    }

    #[tokio::test]
    async fn test_completion_after_slot_dropped_is_ignored() {
        let (mock, stash) = stashing_mock(vec![None]);
        let slot = ImageSlot::new(Arc::new(mock));

        slot.bind(Some(URL_A), None).await;
        let completion = take_completion(&stash, 0);
        drop(slot);

        completion(loaded(URL_A, &image(2)));
    }

    mod with_service {
        use super::*;
        use crate::domain::ports::ImageTransport;
        use crate::infrastructure::config::CacheConfig;
        use crate::infrastructure::image::{ImageCacheService, MainQueue};
        use async_trait::async_trait;
        use bytes::Bytes;
        use std::io::Cursor;
        use std::time::Duration;
        use tokio::sync::Semaphore;

        struct GatedTransport {
            gate: Arc<Semaphore>,
        }

        fn png(side: u32) -> Bytes {
            let mut buf = Vec::new();
            image::DynamicImage::new_rgb8(side, side)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .unwrap();
            Bytes::from(buf)
        }

        #[async_trait]
        impl ImageTransport for GatedTransport {
            async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
                self.gate.acquire().await.unwrap().forget();
                Ok(if url == URL_A { png(3) } else { png(5) })
            }
        }

        #[tokio::test]
        async fn test_rebind_never_shows_superseded_image() {
            let temp = tempfile::TempDir::new().unwrap();
            let gate = Arc::new(Semaphore::new(0));
            let config = CacheConfig::default().with_cache_dir(temp.path().join("ImageCache"));
            let service = ImageCacheService::open(
                &config,
                Arc::new(GatedTransport { gate: gate.clone() }),
                MainQueue::spawn(),
            )
            .await
            .unwrap();
            let slot = ImageSlot::new(Arc::new(service.clone()));
            let placeholder = image(1);

            slot.bind(Some(URL_A), Some(placeholder.clone())).await;
            let h1 = slot.fetch_handle().unwrap();
            slot.bind(Some(URL_B), Some(placeholder.clone())).await;
            let h2 = slot.fetch_handle().unwrap();

            assert_ne!(h1, h2);
            assert!(!service.is_in_flight(h1));
            assert!(shows(&slot, &placeholder));

            gate.add_permits(2);
            while service.in_flight_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            service.main_queue().flush().await;

            let content = slot.content();
            let shown = content.image().unwrap();
            assert!(!content.is_placeholder());
            assert_eq!(shown.width(), 5);
        }
    }
}
