//! Instrument facade and configuration.

mod camera;
mod config;

pub use camera::{Camera, CameraError};
pub use config::{
    CameraConfig, ConfigError, ExposureDefaults, FileConfig, GvspDriver, OutputConfig, PixelFormat,
};
