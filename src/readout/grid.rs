//! Single-channel 2-D pixel grid.

/// Row-major grid of 8-bit pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelGrid {
    /// Pixel values, `height` rows of `width` pixels, no padding.
    pixels: Vec<u8>,
    /// Grid width in pixels.
    width: u32,
    /// Grid height in pixels.
    height: u32,
}

impl PixelGrid {
    /// Wraps `pixels` as a `height × width` grid.
    ///
    /// Returns `None` when the pixel count does not match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            pixels,
            width,
            height,
        })
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Consumes the grid, returning the pixel data.
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Returns the grid width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the grid height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Shape as `(rows, columns)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height as usize, self.width as usize)
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// Pixel at `(row, column)`.
    pub fn get(&self, row: usize, column: usize) -> Option<u8> {
        let (rows, columns) = self.shape();
        if row >= rows || column >= columns {
            return None;
        }
        Some(self.pixels[row * columns + column])
    }

    /// One row of pixels.
    pub fn row(&self, row: usize) -> Option<&[u8]> {
        let columns = self.width as usize;
        self.pixels.get(row * columns..(row + 1) * columns)
    }
}

impl std::fmt::Debug for PixelGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_creation() {
        let grid = PixelGrid::new((0..12).collect(), 4, 3).unwrap();

        assert_eq!(grid.shape(), (3, 4));
        assert_eq!(grid.get(0, 0), Some(0));
        assert_eq!(grid.get(2, 3), Some(11));
        assert_eq!(grid.get(3, 0), None);
        assert_eq!(grid.row(1), Some(&[4u8, 5, 6, 7][..]));
        assert_eq!(grid.row(3), None);
    }

    #[test]
    fn test_grid_invalid_size() {
        assert!(PixelGrid::new(vec![0u8; 100], 640, 480).is_none());
    }
}
