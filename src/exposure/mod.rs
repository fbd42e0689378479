//! Exposure/readout state machine.
//!
//! An [`ExposureCycle`] drives one exposure from arming through readout on
//! a [`DeviceSession`](crate::device::DeviceSession):
//!
//! - [`request`]: validated exposure parameters
//! - [`cancel`]: cancellation token and the polled exposure timer
//! - [`state`]: cycle states and legal transitions
//! - [`outcome`]: outcome, metadata and per-cycle report
//! - [`observer`]: notification hooks

pub mod cancel;
mod cycle;
pub mod observer;
pub mod outcome;
pub mod request;
pub mod state;

pub use cancel::{wait_for_exposure, CancellationToken, TimerOutcome, POLL_INTERVAL};
pub use cycle::ExposureCycle;
pub use observer::{ExposureObserver, LoggingObserver, NoopObserver, ObserverSet};
pub use outcome::{CaptureMetadata, CaptureOutcome, CycleError, CycleReport};
pub use request::{ExposureRequest, RequestError, Window, MAX_EXPOSURE_SECONDS};
pub use state::{CycleState, StateMachine, TransitionError};
