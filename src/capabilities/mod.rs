//! Camera capability lookups.
//!
//! Supported features, CCDs, ADC modes, binning modes and readout modes,
//! consumed read-only by the exposure cycle and the instrument facade.

mod table;

pub use table::{
    Binning, BinningParseError, CameraFeature, CapabilityTable, Ccd, ReadoutMode,
};
