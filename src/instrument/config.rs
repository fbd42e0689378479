//! Camera driver configuration.
//!
//! Automatic exposure and gain are always disabled on open: exposure time
//! is owned by the exposure cycle and gain is fixed by the readout mode.

use crate::artifact::{ChecksumAlgorithm, ImageFileFormat};
use crate::capabilities::Binning;
use crate::device::SimulatorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pixel format written to the device on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit monochrome, one byte per pixel.
    #[default]
    Mono8,
}

impl PixelFormat {
    /// Feature value understood by the device.
    pub fn feature_value(&self) -> &'static str {
        match self {
            PixelFormat::Mono8 => "Mono8",
        }
    }

    /// Bits per pixel in the readout buffer.
    pub fn bit_depth(&self) -> u32 {
        match self {
            PixelFormat::Mono8 => 8,
        }
    }
}

/// GigE Vision streaming driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GvspDriver {
    /// Plain socket driver.
    #[default]
    Socket,
    /// Vendor filter driver.
    Filter,
}

impl GvspDriver {
    /// Feature value understood by the device.
    pub fn feature_value(&self) -> &'static str {
        match self {
            GvspDriver::Socket => "Socket",
            GvspDriver::Filter => "Filter",
        }
    }
}

/// Configuration for opening and driving one camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera to open; the first discovered camera when unset or not found.
    pub camera_id: Option<String>,
    /// Readout pixel format.
    pub pixel_format: PixelFormat,
    /// Streaming driver.
    pub gvsp_driver: GvspDriver,
    /// Settling time after GigE discovery, in milliseconds.
    pub discovery_settle_ms: u64,
    /// Bound on the post-exposure frame wait, in milliseconds.
    /// `None` waits indefinitely.
    pub readout_timeout_ms: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_id: None,
            pixel_format: PixelFormat::Mono8,
            gvsp_driver: GvspDriver::Socket,
            discovery_settle_ms: 200,
            readout_timeout_ms: Some(10_000),
        }
    }
}

impl CameraConfig {
    /// Discovery settling delay.
    pub fn discovery_settle(&self) -> Duration {
        Duration::from_millis(self.discovery_settle_ms)
    }

    /// Readout wait bound.
    pub fn readout_timeout(&self) -> Option<Duration> {
        self.readout_timeout_ms.map(Duration::from_millis)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.readout_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidReadoutTimeout);
        }
        if matches!(&self.camera_id, Some(id) if id.trim().is_empty()) {
            return Err(ConfigError::InvalidCameraId);
        }
        Ok(())
    }
}

/// Defaults for exposures requested from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureDefaults {
    /// Exposure time in seconds.
    pub exposure_time: f64,
    /// Binning label.
    pub binning: Binning,
    /// Number of sequential single-frame cycles.
    pub frames: u32,
}

impl Default for ExposureDefaults {
    fn default() -> Self {
        Self {
            exposure_time: 1.0,
            binning: Binning::FULL,
            frames: 1,
        }
    }
}

impl ExposureDefaults {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exposure_time.is_finite() && self.exposure_time > 0.0) {
            return Err(ConfigError::InvalidExposure);
        }
        if self.frames == 0 {
            return Err(ConfigError::InvalidFrameCount);
        }
        Ok(())
    }
}

/// Where and how artifacts are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Target directory.
    pub directory: PathBuf,
    /// Image file format.
    pub format: ImageFileFormat,
    /// Checksum recorded in the metadata sidecar.
    pub checksum: ChecksumAlgorithm,
    /// File name prefix.
    pub prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("frames"),
            format: ImageFileFormat::Png,
            checksum: ChecksumAlgorithm::Blake3,
            prefix: "frame".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid exposure time (must be a positive number of seconds)")]
    InvalidExposure,
    #[error("invalid frame count (must be at least 1)")]
    InvalidFrameCount,
    #[error("invalid readout timeout (must be positive or unset)")]
    InvalidReadoutTimeout,
    #[error("invalid camera id")]
    InvalidCameraId,
    #[error("invalid simulated sensor dimensions")]
    InvalidDimensions,
    #[error("invalid artifact prefix")]
    InvalidPrefix,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub exposure: ExposureDefaults,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.exposure.validate()?;
        if self.simulator.width == 0 || self.simulator.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.output.prefix.is_empty() || self.output.prefix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidPrefix);
        }
        Ok(())
    }
}
