//! Widgets that display cached images.

mod image_slot;
mod prefetch;

pub use image_slot::{ImageSlot, SlotContent};
pub use prefetch::{LOAD_BUFFER, prefetch_around, prefetch_rows};
