//! Presentation layer binding cached images to reusable views.

/// Reusable widgets.
pub mod widgets;

pub use widgets::{ImageSlot, SlotContent};
