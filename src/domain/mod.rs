//! Domain layer with core entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, FetchHandle, ImageSource, LoadedImage, SharedImage};
pub use errors::{ImageCacheError, ImageResult, TransportError};
pub use ports::{Completion, ImageCachePort, ImageTransport};
