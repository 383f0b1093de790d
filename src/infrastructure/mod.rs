//! Infrastructure layer with cache tiers and external service adapters.

/// Cache configuration.
pub mod config;
/// Image caching (tiers, transport, delivery, service).
pub mod image;
/// Tracing subscriber setup.
pub mod logging;

pub use config::{CacheConfig, ConfigError, LogLevel};
pub use self::image::{
    CacheStats, DiskImageCache, HttpImageTransport, ImageCacheService, MainQueue,
    MemoryImageCache, PendingImage, ServiceInitError,
};
pub use logging::init_logging;
