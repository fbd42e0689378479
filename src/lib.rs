//! GigE Camera Exposure Library
//!
//! Single-frame exposure and readout control for a networked area-scan
//! camera used as an instrument imager. Drives one exposure at a time from
//! arming through readout, honours cancellation within one poll interval,
//! and always returns the device to an idle, buffer-free state.
//!
//! # Architecture
//!
//! ```text
//! instrument::Camera
//!     └─ exposure::ExposureCycle ── observers (logging, metrics)
//!            ├─ device::DeviceSession ── device::Transport (vendor API / simulator)
//!            ├─ readout (decode + statistics)
//!            └─ artifact::ArtifactSink (memory / directory)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gige_exposure::{
//!     artifact::MemorySink,
//!     capabilities::Binning,
//!     device::{SimulatedTransport, SimulatorConfig},
//!     exposure::ExposureRequest,
//!     instrument::{Camera, CameraConfig},
//! };
//!
//! let sink = MemorySink::new();
//! let camera = Camera::open(
//!     SimulatedTransport::new(SimulatorConfig::default()),
//!     &CameraConfig::default(),
//!     sink.clone(),
//! )
//! .unwrap();
//!
//! let request = ExposureRequest::new(0.5, Binning::FULL).unwrap();
//! let report = camera.run_cycle(&request).unwrap();
//! if let Some(handle) = report.artifact() {
//!     let frame = sink.get(handle).unwrap();
//!     println!("{:?} at {:.1} °C", frame.pixels.shape(), frame.metadata.frame_temperature());
//! }
//! camera.close();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod artifact;
pub mod capabilities;
pub mod device;
pub mod exposure;
pub mod instrument;
pub mod metrics;
pub mod readout;

// Re-export commonly used types at crate root
pub use artifact::{ArtifactHandle, ArtifactSink, DirectorySink, MemorySink};
pub use capabilities::{Binning, CapabilityTable};
pub use device::{DeviceError, DeviceSession, SimulatedTransport, SimulatorConfig, Transport};
pub use exposure::{
    CancellationToken, CaptureMetadata, CaptureOutcome, CycleError, CycleReport, CycleState,
    ExposureCycle, ExposureRequest,
};
pub use instrument::{Camera, CameraConfig, CameraError, FileConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
