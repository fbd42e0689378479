//! Exposure requests.

use crate::capabilities::{Binning, CapabilityTable};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Longest exposure accepted, in seconds.
pub const MAX_EXPOSURE_SECONDS: f64 = 86_400.0;

/// Readout region, in unbinned pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Reasons an exposure request is refused before touching the device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("invalid exposure time {0} s (must be positive and at most {MAX_EXPOSURE_SECONDS} s)")]
    InvalidExposure(f64),
    #[error("binning {0} is not supported")]
    UnsupportedBinning(Binning),
    #[error("window {window} is not supported (only the full {width}x{height} frame can be read out)")]
    UnsupportedWindow {
        window: Window,
        width: u32,
        height: u32,
    },
}

/// Parameters of one exposure, immutable for the duration of a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureRequest {
    exposure_time: f64,
    binning: Binning,
    window: Option<Window>,
}

impl ExposureRequest {
    /// Creates a full-frame request.
    pub fn new(exposure_time_seconds: f64, binning: Binning) -> Result<Self, RequestError> {
        if !(exposure_time_seconds.is_finite()
            && exposure_time_seconds > 0.0
            && exposure_time_seconds <= MAX_EXPOSURE_SECONDS)
        {
            return Err(RequestError::InvalidExposure(exposure_time_seconds));
        }
        Ok(Self {
            exposure_time: exposure_time_seconds,
            binning,
            window: None,
        })
    }

    /// Restricts readout to `window`.
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    /// Exposure time in seconds.
    #[inline]
    pub fn exposure_time(&self) -> f64 {
        self.exposure_time
    }

    /// Exposure time as a duration.
    pub fn exposure_duration(&self) -> Duration {
        Duration::from_secs_f64(self.exposure_time)
    }

    /// Requested binning.
    #[inline]
    pub fn binning(&self) -> Binning {
        self.binning
    }

    /// Requested window, if any.
    #[inline]
    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Checks the request against the camera capabilities.
    ///
    /// Returns the binning factor to record on the artifact.
    pub fn validate_against(&self, capabilities: &CapabilityTable) -> Result<u32, RequestError> {
        let factor = capabilities
            .binning_factor(self.binning)
            .ok_or(RequestError::UnsupportedBinning(self.binning))?;

        let geometry = capabilities.geometry();
        if let Some(window) = self.window {
            let full_frame = Window {
                top: 0,
                left: 0,
                width: geometry.width,
                height: geometry.height,
            };
            if window != full_frame {
                return Err(RequestError::UnsupportedWindow {
                    window,
                    width: geometry.width,
                    height: geometry.height,
                });
            }
        }
        Ok(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::FrameGeometry;

    fn capabilities() -> CapabilityTable {
        CapabilityTable::for_geometry(FrameGeometry::new(640, 480, 8))
    }

    #[test]
    fn test_rejects_bad_exposure_times() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, MAX_EXPOSURE_SECONDS * 2.0] {
            assert!(
                matches!(ExposureRequest::new(bad, Binning::FULL), Err(RequestError::InvalidExposure(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_exposure_bound_is_inclusive() {
        let longest = ExposureRequest::new(MAX_EXPOSURE_SECONDS, Binning::FULL).unwrap();
        assert_eq!(longest.exposure_duration(), Duration::from_secs(86_400));

        let just_over = MAX_EXPOSURE_SECONDS + 0.001;
        assert_eq!(
            ExposureRequest::new(just_over, Binning::FULL).unwrap_err(),
            RequestError::InvalidExposure(just_over)
        );
    }

    #[test]
    fn test_full_frame_request_is_valid() {
        let request = ExposureRequest::new(0.05, Binning::FULL).unwrap();
        assert_eq!(request.validate_against(&capabilities()), Ok(1));
        assert_eq!(request.exposure_duration(), Duration::from_millis(50));
    }

    #[test]
    fn test_unsupported_binning() {
        let binning: Binning = "2x2".parse().unwrap();
        let request = ExposureRequest::new(1.0, binning).unwrap();
        assert_eq!(
            request.validate_against(&capabilities()),
            Err(RequestError::UnsupportedBinning(binning))
        );
    }

    #[test]
    fn test_only_full_frame_window_accepted() {
        let full = Window {
            top: 0,
            left: 0,
            width: 640,
            height: 480,
        };
        let request = ExposureRequest::new(1.0, Binning::FULL).unwrap().with_window(full);
        assert!(request.validate_against(&capabilities()).is_ok());

        let sub = Window { width: 100, ..full };
        let request = ExposureRequest::new(1.0, Binning::FULL).unwrap().with_window(sub);
        assert!(matches!(
            request.validate_against(&capabilities()),
            Err(RequestError::UnsupportedWindow { .. })
        ));
    }
}
