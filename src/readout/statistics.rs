//! Summary statistics of a decoded frame.
//!
//! Recorded alongside each artifact so the value range of a frame can be
//! checked without reopening the image.

use super::grid::PixelGrid;
use serde::{Deserialize, Serialize};

/// Brightest representable 8-bit value.
const SATURATION_LEVEL: u8 = u8::MAX;

/// Pixel statistics of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelStatistics {
    /// Smallest pixel value.
    pub min: u8,
    /// Largest pixel value.
    pub max: u8,
    /// Mean pixel value.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Fraction of pixels at the saturation level.
    pub saturated_fraction: f64,
}

impl PixelStatistics {
    /// Computes statistics over every pixel of the grid.
    pub fn analyze(grid: &PixelGrid) -> Self {
        let data = grid.pixels();
        if data.is_empty() {
            return Self {
                min: 0,
                max: 0,
                mean: 0.0,
                std_dev: 0.0,
                saturated_fraction: 0.0,
            };
        }

        let n = data.len() as f64;
        let min = data.iter().copied().min().unwrap_or(0);
        let max = data.iter().copied().max().unwrap_or(0);
        let mean: f64 = data.iter().map(|&b| b as f64).sum::<f64>() / n;
        let variance: f64 = data.iter().map(|&b| (b as f64 - mean).powi(2)).sum::<f64>() / n;
        let saturated = data.iter().filter(|&&b| b == SATURATION_LEVEL).count();

        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            saturated_fraction: saturated as f64 / n,
        }
    }

    /// Returns true if any pixel reached the saturation level.
    pub fn is_saturated(&self) -> bool {
        self.saturated_fraction > 0.0
    }
}
