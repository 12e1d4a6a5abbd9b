//! Slot storage module
//!
//! Ten addressable clipboard slots, each holding a tagged content value:
//! - Empty: nothing stored (initial state)
//! - Text: a plain-text payload
//! - Image: an RGBA raster payload

mod content;
mod store;

pub use content::{Content, RasterImage};
pub use store::{SlotIndex, SlotStore, SLOT_COUNT};
