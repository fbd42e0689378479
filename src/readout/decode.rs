//! Raw frame buffer to pixel grid.
//!
//! The buffer length is validated against `height × width × bit_depth / 8`
//! before any pixel is interpreted. Undersized buffers are rejected;
//! trailing bytes beyond the frame are ignored.

use super::grid::PixelGrid;
use crate::device::FrameGeometry;
use thiserror::Error;

/// Errors decoding a raw frame buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
    #[error("unsupported bit depth: {0} (only 8-bit readout is supported)")]
    UnsupportedBitDepth(u32),
    #[error("frame geometry has no pixels")]
    EmptyGeometry,
}

/// Interprets `raw` as a row-major, unpadded 8-bit grid of `geometry`.
pub fn decode_mono8(raw: &[u8], geometry: FrameGeometry) -> Result<PixelGrid, DecodeError> {
    if geometry.bit_depth != 8 {
        return Err(DecodeError::UnsupportedBitDepth(geometry.bit_depth));
    }
    if geometry.pixel_count() == 0 {
        return Err(DecodeError::EmptyGeometry);
    }

    let expected = geometry.byte_len();
    if raw.len() < expected {
        return Err(DecodeError::BufferTooShort {
            expected,
            actual: raw.len(),
        });
    }

    PixelGrid::new(raw[..expected].to_vec(), geometry.width, geometry.height).ok_or(
        DecodeError::BufferTooShort {
            expected,
            actual: raw.len(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_row_major() {
        // 3x2 image: rows [0, 1, 2] and [3, 4, 5]
        let raw: Vec<u8> = (0..6).collect();
        let grid = decode_mono8(&raw, FrameGeometry::new(3, 2, 8)).unwrap();

        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.row(0), Some(&[0u8, 1, 2][..]));
        assert_eq!(grid.get(1, 0), Some(3));
    }

    #[test]
    fn test_undersized_buffer_rejected() {
        let raw = vec![0u8; 5];
        let err = decode_mono8(&raw, FrameGeometry::new(3, 2, 8)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BufferTooShort {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let raw = vec![7u8; 10];
        let grid = decode_mono8(&raw, FrameGeometry::new(2, 2, 8)).unwrap();
        assert_eq!(grid.pixel_count(), 4);
    }

    #[test]
    fn test_other_bit_depths_rejected() {
        let raw = vec![0u8; 16];
        assert_eq!(
            decode_mono8(&raw, FrameGeometry::new(2, 2, 16)),
            Err(DecodeError::UnsupportedBitDepth(16))
        );
        assert_eq!(
            decode_mono8(&raw, FrameGeometry::new(0, 2, 8)),
            Err(DecodeError::EmptyGeometry)
        );
    }

    proptest! {
        #[test]
        fn decoded_shape_matches_geometry(width in 1u32..64, height in 1u32..64, extra in 0usize..16) {
            let geometry = FrameGeometry::new(width, height, 8);
            let raw = vec![0x5Au8; geometry.byte_len() + extra];

            let grid = decode_mono8(&raw, geometry).unwrap();
            prop_assert_eq!(grid.shape(), (height as usize, width as usize));
        }

        #[test]
        fn any_short_buffer_is_rejected(width in 1u32..64, height in 1u32..64, missing in 1usize..64) {
            let geometry = FrameGeometry::new(width, height, 8);
            let len = geometry.byte_len().saturating_sub(missing);
            let is_too_short = matches!(
                decode_mono8(&vec![0u8; len], geometry),
                Err(DecodeError::BufferTooShort { .. })
            );
            prop_assert!(is_too_short);
        }
    }
}
