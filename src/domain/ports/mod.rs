mod image_cache_port;
mod image_transport_port;

pub use image_cache_port::{Completion, ImageCachePort};
pub use image_transport_port::ImageTransport;
