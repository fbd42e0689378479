//! Prometheus metrics for exposure cycles.
//!
//! A [`MetricsObserver`] registered on the camera records every finished
//! cycle into a [`MetricsRegistry`]. With the `metrics` feature the
//! registry can be served over HTTP.
//!
//! # Metrics Exposed
//!
//! ## Outcomes
//! - `gige_exposure_cycles_ok_total` - Cycles that produced a frame
//! - `gige_exposure_cycles_aborted_total` - Cycles cancelled while exposing
//! - `gige_exposure_cycles_failed_total` - Failed cycles
//! - `gige_exposure_artifacts_stored_total` - Artifacts handed to the sink
//!
//! ## Last cycle
//! - `gige_exposure_last_exposure_seconds` - Requested exposure time
//! - `gige_exposure_last_frame_temperature_celsius` - Temperature at exposure start
//! - `gige_exposure_last_cycle_duration_seconds` - Wall-clock cycle duration
//!
//! # Example
//!
//! ```no_run
//! use gige_exposure::metrics::{MetricsObserver, MetricsRegistry};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! let observer = MetricsObserver::new(registry.clone());
//! // camera.add_observer(observer);
//! # drop(observer);
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
mod observer;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry};
pub use observer::MetricsObserver;
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError, DEFAULT_METRICS_PORT};
