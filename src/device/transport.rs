//! Vendor transport and device abstraction.
//!
//! A [`Transport`] is the vendor "system" object: it discovers cameras on
//! the network and opens them. A [`Device`] is one opened camera exposing
//! GenICam-style features, commands and capture buffer operations.
//!
//! Both are traits so the session and exposure cycle can run against real
//! hardware bindings or the [`SimulatedTransport`](super::SimulatedTransport)
//! used in tests and the command-line driver.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a transport or an opened device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("no camera found on this network")]
    NoDeviceFound,
    #[error("feature {feature} rejected: {reason}")]
    Config { feature: String, reason: String },
    #[error("command {command} rejected: {reason}")]
    Command { command: String, reason: String },
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
    #[error("feature {feature} has unexpected type (expected {expected})")]
    TypeMismatch {
        feature: String,
        expected: &'static str,
    },
    #[error("timed out waiting for the device")]
    Timeout,
    #[error("device protocol error: {0}")]
    Protocol(String),
}

impl DeviceError {
    /// Returns true for register or command rejections.
    pub fn is_config_error(&self) -> bool {
        matches!(self, DeviceError::Config { .. } | DeviceError::Command { .. })
    }
}

/// Value of a device feature register.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Enum(String),
    Bool(bool),
}

impl FeatureValue {
    /// Builds an enumeration value from a string label.
    pub fn enumeration(label: impl Into<String>) -> Self {
        FeatureValue::Enum(label.into())
    }

    /// Returns the value as an integer, widening nothing.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FeatureValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are converted.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FeatureValue::Float(v) => Some(*v),
            FeatureValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the enumeration label.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Enum(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{v}"),
            FeatureValue::Float(v) => write!(f, "{v}"),
            FeatureValue::Enum(s) => f.write_str(s),
            FeatureValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Device-side identifier of an announced capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Frame geometry as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bits per pixel.
    pub bit_depth: u32,
}

impl FrameGeometry {
    /// Creates a geometry with the given dimensions and bit depth.
    pub fn new(width: u32, height: u32, bit_depth: u32) -> Self {
        Self {
            width,
            height,
            bit_depth,
        }
    }

    /// Total number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Number of bytes a packed, unpadded frame occupies.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixel_count() * (self.bit_depth as usize) / 8
    }
}

/// Data handed back by the device once a queued frame has been filled.
#[derive(Debug, Clone)]
pub struct FilledFrame {
    /// Width the device reports for the captured frame.
    pub width: u32,
    /// Height the device reports for the captured frame.
    pub height: u32,
    /// Raw pixel bytes.
    pub bytes: Vec<u8>,
}

/// Vendor system object: discovery and camera opening.
pub trait Transport {
    /// Device type produced by [`Transport::open_camera`].
    type Device: Device;

    /// Starts the vendor runtime.
    fn startup(&mut self) -> Result<(), DeviceError>;

    /// Version string of the vendor runtime.
    fn version(&self) -> String;

    /// Whether a GigE Vision transport layer is present.
    fn gige_present(&self) -> bool;

    /// Runs a system-level command such as GigE discovery.
    fn run_command(&mut self, command: &str) -> Result<(), DeviceError>;

    /// Lists identifiers of cameras currently discoverable.
    fn camera_ids(&mut self) -> Result<Vec<String>, DeviceError>;

    /// Opens the camera with the given identifier.
    fn open_camera(&mut self, id: &str) -> Result<Self::Device, DeviceError>;

    /// Stops the vendor runtime.
    fn shutdown(&mut self);
}

/// One opened camera.
pub trait Device {
    /// Writes a feature register.
    fn write_feature(&mut self, name: &str, value: FeatureValue) -> Result<(), DeviceError>;

    /// Reads a feature register.
    fn read_feature(&mut self, name: &str) -> Result<FeatureValue, DeviceError>;

    /// Invokes a command feature.
    fn run_command(&mut self, name: &str) -> Result<(), DeviceError>;

    /// Starts the host-side capture engine.
    fn start_capture(&mut self) -> Result<(), DeviceError>;

    /// Stops the host-side capture engine.
    fn end_capture(&mut self) -> Result<(), DeviceError>;

    /// Allocates and announces a capture buffer of `len` bytes.
    fn announce_frame(&mut self, len: usize) -> Result<FrameId, DeviceError>;

    /// Submits an announced buffer for the next capture.
    fn queue_frame(&mut self, frame: FrameId) -> Result<(), DeviceError>;

    /// Blocks until the queued buffer is filled, or `timeout` elapses.
    ///
    /// `None` waits indefinitely.
    fn wait_frame(
        &mut self,
        frame: FrameId,
        timeout: Option<Duration>,
    ) -> Result<FilledFrame, DeviceError>;

    /// Releases one announced buffer.
    fn revoke_frame(&mut self, frame: FrameId) -> Result<(), DeviceError>;

    /// Releases every buffer still announced on this device.
    fn revoke_all_frames(&mut self) -> Result<(), DeviceError>;

    /// Closes the camera.
    fn close(&mut self) -> Result<(), DeviceError>;
}
