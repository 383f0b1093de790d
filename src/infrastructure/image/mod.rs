//! Image caching infrastructure.
//!
//! This module provides:
//! - Memory caching bounded by count and decoded size
//! - Disk caching for persistence
//! - An HTTP transport for network fetches
//! - The single delivery queue completions run on
//! - The cache service tying the tiers together

pub mod disk_cache;
pub mod http_transport;
pub mod main_queue;
pub mod memory_cache;
pub mod service;

pub use disk_cache::DiskImageCache;
pub use http_transport::HttpImageTransport;
pub use main_queue::MainQueue;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use service::{ImageCacheService, PendingImage, ServiceInitError};
