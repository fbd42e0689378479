//! Cycle outcomes and reports.

use super::request::RequestError;
use super::state::{CycleState, TransitionError};
use crate::artifact::{ArtifactHandle, SinkError};
use crate::device::{BufferError, DeviceError};
use crate::readout::DecodeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Metadata captured once per exposure, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    frame_start_time: DateTime<Utc>,
    frame_temperature: f64,
    binning_factor: u32,
}

impl CaptureMetadata {
    pub fn new(frame_start_time: DateTime<Utc>, frame_temperature: f64, binning_factor: u32) -> Self {
        Self {
            frame_start_time,
            frame_temperature,
            binning_factor,
        }
    }

    /// Wall-clock time at which acquisition was started.
    pub fn frame_start_time(&self) -> DateTime<Utc> {
        self.frame_start_time
    }

    /// Sensor temperature in °C, sampled once at exposure start.
    pub fn frame_temperature(&self) -> f64 {
        self.frame_temperature
    }

    pub fn binning_factor(&self) -> u32 {
        self.binning_factor
    }
}

/// Why a cycle failed.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("invalid exposure request: {0}")]
    Request(#[from] RequestError),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("frame buffer error: {0}")]
    Buffer(BufferError),
    #[error("timed out waiting for the frame buffer to fill")]
    ReadoutTimeout,
    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to store artifact: {0}")]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<BufferError> for CycleError {
    fn from(err: BufferError) -> Self {
        match err {
            BufferError::Device(DeviceError::Timeout) => CycleError::ReadoutTimeout,
            BufferError::Device(device) => CycleError::Device(device),
            other => CycleError::Buffer(other),
        }
    }
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// A frame was read out and stored.
    Ok,
    /// The exposure was cancelled; no frame was produced.
    Aborted,
    Failed(CycleError),
}

impl CaptureOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, CaptureOutcome::Ok)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CaptureOutcome::Aborted)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CaptureOutcome::Failed(_))
    }

    /// Failure cause, if the cycle failed.
    pub fn error(&self) -> Option<&CycleError> {
        match self {
            CaptureOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Lowercase label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CaptureOutcome::Ok => "ok",
            CaptureOutcome::Aborted => "aborted",
            CaptureOutcome::Failed(_) => "failed",
        }
    }
}

/// Everything known about a finished cycle.
///
/// An artifact is present only when the outcome is [`CaptureOutcome::Ok`].
#[derive(Debug)]
pub struct CycleReport {
    outcome: CaptureOutcome,
    artifact: Option<ArtifactHandle>,
    metadata: Option<CaptureMetadata>,
    states: Vec<CycleState>,
    exposure_time: f64,
    duration: Duration,
}

impl CycleReport {
    pub(crate) fn new(
        outcome: CaptureOutcome,
        artifact: Option<ArtifactHandle>,
        metadata: Option<CaptureMetadata>,
        states: Vec<CycleState>,
        exposure_time: f64,
        duration: Duration,
    ) -> Self {
        debug_assert_eq!(outcome.is_ok(), artifact.is_some());
        Self {
            outcome,
            artifact,
            metadata,
            states,
            exposure_time,
            duration,
        }
    }

    pub fn outcome(&self) -> &CaptureOutcome {
        &self.outcome
    }

    /// Stored artifact of a successful cycle.
    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        self.artifact.as_ref()
    }

    /// Capture metadata, once the exposure has started.
    pub fn metadata(&self) -> Option<&CaptureMetadata> {
        self.metadata.as_ref()
    }

    /// States visited, starting with [`CycleState::Idle`].
    pub fn states(&self) -> &[CycleState] {
        &self.states
    }

    pub fn final_state(&self) -> CycleState {
        self.states.last().copied().unwrap_or(CycleState::Idle)
    }

    /// Requested exposure time in seconds.
    pub fn exposure_time(&self) -> f64 {
        self.exposure_time
    }

    /// Wall-clock duration of the whole cycle.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Consumes the report, returning the outcome.
    pub fn into_outcome(self) -> CaptureOutcome {
        self.outcome
    }
}
