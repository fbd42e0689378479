//! Static capability lookups for the camera.
//!
//! Everything here is fixed for the lifetime of a session: the table is
//! built once from the device's maximum geometry at open time and never
//! mutated afterwards.

use crate::device::FrameGeometry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pixel pitch of the sensor, in micrometres.
const PIXEL_PITCH_UM: f64 = 5.5;

/// Optional camera features a client may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CameraFeature {
    TemperatureControl,
    ProgrammableGain,
    ProgrammableOverscan,
    ProgrammableFan,
    ProgrammableLeds,
    ProgrammableBiasLevel,
}

/// Role of a CCD on the camera head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ccd {
    Imaging,
    Tracking,
}

/// Binning mode identified by its `"HxV"` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Binning {
    pub horizontal: u8,
    pub vertical: u8,
}

impl Binning {
    /// Full-resolution readout.
    pub const FULL: Binning = Binning {
        horizontal: 1,
        vertical: 1,
    };
}

impl Default for Binning {
    fn default() -> Self {
        Self::FULL
    }
}

impl fmt::Display for Binning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.horizontal, self.vertical)
    }
}

/// Errors parsing a binning label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid binning label: {0:?} (expected e.g. \"1x1\")")]
pub struct BinningParseError(pub String);

impl FromStr for Binning {
    type Err = BinningParseError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let invalid = || BinningParseError(label.to_string());
        let (h, v) = label.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let horizontal: u8 = h.trim().parse().map_err(|_| invalid())?;
        let vertical: u8 = v.trim().parse().map_err(|_| invalid())?;
        if horizontal == 0 || vertical == 0 {
            return Err(invalid());
        }
        Ok(Self {
            horizontal,
            vertical,
        })
    }
}

impl TryFrom<String> for Binning {
    type Error = BinningParseError;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        label.parse()
    }
}

impl From<Binning> for String {
    fn from(binning: Binning) -> Self {
        binning.to_string()
    }
}

/// One readout mode of a CCD.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutMode {
    pub mode: u32,
    pub gain: f64,
    pub width: u32,
    pub height: u32,
    /// Pixel width in micrometres.
    pub pixel_width: f64,
    /// Pixel height in micrometres.
    pub pixel_height: f64,
}

/// Read-only table of what the camera supports.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    features: BTreeMap<CameraFeature, bool>,
    ccds: BTreeMap<u32, Ccd>,
    current_ccd: u32,
    adcs: BTreeMap<String, u32>,
    binnings: BTreeMap<Binning, u32>,
    binning_factors: BTreeMap<Binning, u32>,
    readout_modes: BTreeMap<u32, BTreeMap<u32, ReadoutMode>>,
    geometry: FrameGeometry,
}

impl CapabilityTable {
    /// Builds the table for a sensor with the given maximum geometry.
    pub fn for_geometry(geometry: FrameGeometry) -> Self {
        let features = BTreeMap::from([
            (CameraFeature::TemperatureControl, false),
            (CameraFeature::ProgrammableGain, true),
            (CameraFeature::ProgrammableOverscan, false),
            (CameraFeature::ProgrammableFan, false),
            (CameraFeature::ProgrammableLeds, false),
            (CameraFeature::ProgrammableBiasLevel, false),
        ]);

        let full_frame = ReadoutMode {
            mode: 0,
            gain: 1.0,
            width: geometry.width,
            height: geometry.height,
            pixel_width: PIXEL_PITCH_UM,
            pixel_height: PIXEL_PITCH_UM,
        };

        Self {
            features,
            ccds: BTreeMap::from([(0, Ccd::Tracking)]),
            current_ccd: 0,
            adcs: BTreeMap::from([("12 bits".to_string(), 0)]),
            binnings: BTreeMap::from([(Binning::FULL, 0)]),
            binning_factors: BTreeMap::from([(Binning::FULL, 1)]),
            readout_modes: BTreeMap::from([(0, BTreeMap::from([(0, full_frame)]))]),
            geometry,
        }
    }

    /// Whether `feature` is supported.
    pub fn supports(&self, feature: CameraFeature) -> bool {
        self.features.get(&feature).copied().unwrap_or(false)
    }

    /// CCDs by index.
    pub fn ccds(&self) -> &BTreeMap<u32, Ccd> {
        &self.ccds
    }

    /// Index of the CCD used for readout.
    pub fn current_ccd(&self) -> u32 {
        self.current_ccd
    }

    /// ADC modes by label.
    pub fn adcs(&self) -> &BTreeMap<String, u32> {
        &self.adcs
    }

    /// Supported binning modes mapped to their device mode index.
    pub fn binnings(&self) -> &BTreeMap<Binning, u32> {
        &self.binnings
    }

    /// Binning factor recorded on artifacts, if the mode is supported.
    pub fn binning_factor(&self, binning: Binning) -> Option<u32> {
        self.binning_factors.get(&binning).copied()
    }

    /// Readout modes per CCD.
    pub fn readout_modes(&self) -> &BTreeMap<u32, BTreeMap<u32, ReadoutMode>> {
        &self.readout_modes
    }

    /// Full-frame geometry of the sensor.
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Physical sensor size in millimetres; unknown for this camera.
    pub fn physical_size(&self) -> Option<(f64, f64)> {
        None
    }

    /// Pixel size in micrometres; unknown for this camera.
    pub fn pixel_size(&self) -> Option<(f64, f64)> {
        None
    }

    /// Overscan columns and rows.
    pub fn overscan_size(&self) -> (u32, u32) {
        (0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CapabilityTable {
        CapabilityTable::for_geometry(FrameGeometry::new(1292, 964, 8))
    }

    #[test]
    fn test_binning_labels() {
        assert_eq!("1x1".parse::<Binning>().unwrap(), Binning::FULL);
        assert_eq!(
            " 2X4 ".parse::<Binning>().unwrap(),
            Binning {
                horizontal: 2,
                vertical: 4
            }
        );
        assert!("0x1".parse::<Binning>().is_err());
        assert!("full".parse::<Binning>().is_err());
        assert_eq!(Binning::FULL.to_string(), "1x1");
    }

    #[test]
    fn test_only_full_binning_supported() {
        let table = table();
        assert_eq!(table.binning_factor(Binning::FULL), Some(1));
        assert_eq!("2x2".parse().ok().and_then(|b| table.binning_factor(b)), None);
    }

    #[test]
    fn test_feature_support() {
        let table = table();
        assert!(table.supports(CameraFeature::ProgrammableGain));
        assert!(!table.supports(CameraFeature::TemperatureControl));
        assert!(!table.supports(CameraFeature::ProgrammableFan));
    }

    #[test]
    fn test_readout_mode_matches_geometry() {
        let table = table();
        let mode = &table.readout_modes()[&0][&0];
        assert_eq!((mode.width, mode.height), (1292, 964));
        assert_eq!(mode.pixel_width, 5.5);
        assert_eq!(table.ccds()[&table.current_ccd()], Ccd::Tracking);
        assert_eq!(table.overscan_size(), (0, 0));
    }
}
