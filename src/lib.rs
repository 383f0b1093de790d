//! nft-image-cache - Two-tier image cache for NFT artwork.
//!
//! This crate provides a memory and disk backed image cache with cancellable
//! network fetches, plus a binding coordinator that keeps reusable views from
//! ever showing an image meant for a previous binding.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing cache tiers and external adapters.
pub mod infrastructure;
/// Presentation layer containing image-bound widgets.
pub mod presentation;

pub use domain::{
    CacheKey, Completion, FetchHandle, ImageCacheError, ImageCachePort, ImageResult, ImageSource,
    ImageTransport, LoadedImage, SharedImage, TransportError,
};
pub use infrastructure::{CacheConfig, ImageCacheService, MainQueue, init_logging};
pub use presentation::{ImageSlot, SlotContent};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = "nft-image-cache";
