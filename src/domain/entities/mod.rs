//! Domain entity definitions.

mod image;

pub use self::image::{CacheKey, FetchHandle, ImageSource, LoadedImage, SharedImage};
