//! Frame buffer marshalling.
//!
//! Converts the raw bytes of a filled capture buffer into a validated
//! single-channel pixel grid and summarises its value range.

mod decode;
mod grid;
mod statistics;

pub use decode::{decode_mono8, DecodeError};
pub use grid::PixelGrid;
pub use statistics::PixelStatistics;
