//! Device access: vendor transport, camera session and capture buffers.
//!
//! This module wraps the vendor camera API behind the [`Transport`] and
//! [`Device`] traits. [`DeviceSession`] owns one opened camera and
//! [`FrameBufferHandle`] tracks one device-side capture buffer. The
//! simulated implementation backs the tests and the command-line driver.

mod buffer;
pub mod features;
mod session;
mod simulated;
mod transport;

pub use buffer::{BufferError, BufferState, FrameBufferHandle};
pub use session::{DeviceInfo, DeviceSession};
pub use simulated::{
    SimulatedCamera, SimulatedTransport, SimulatorConfig, SimulatorFaults, SimulatorProbe,
    SimulatorStats, SIMULATOR_VERSION,
};
pub use transport::{
    Device, DeviceError, FeatureValue, FilledFrame, FrameGeometry, FrameId, Transport,
};
