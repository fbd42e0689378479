//! One exposure/readout cycle.
//!
//! ```text
//! Idle -> Armed -> Exposing -> Stopping -> ReadingOut -> Done
//!                     |
//!                     +-> Aborting -> Done
//! ```
//!
//! Any state may fall through to `Failed`. Whatever the outcome, the
//! finalize step runs exactly once: it stops acquisition and ends capture
//! if either is still running, then revokes the frame buffer. Errors raised
//! while cleaning up are logged and never replace the cycle outcome.

use super::cancel::{wait_for_exposure, CancellationToken, TimerOutcome};
use super::observer::{ExposureObserver, NoopObserver};
use super::outcome::{CaptureMetadata, CaptureOutcome, CycleError, CycleReport};
use super::request::ExposureRequest;
use super::state::{CycleState, StateMachine};
use crate::artifact::{Artifact, ArtifactHandle, ArtifactSink};
use crate::device::{DeviceSession, FrameBufferHandle, Transport};
use crate::readout::{decode_mono8, PixelStatistics};
use chrono::Utc;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static NOOP_OBSERVER: NoopObserver = NoopObserver;

/// Runs a single exposure against an open session.
pub struct ExposureCycle<'a, T: Transport> {
    session: &'a mut DeviceSession<T>,
    sink: &'a mut dyn ArtifactSink,
    observer: &'a dyn ExposureObserver,
    cancel: CancellationToken,
    readout_timeout: Option<Duration>,
}

enum Completion {
    Stored(ArtifactHandle),
    Aborted,
}

#[derive(Default)]
struct Progress {
    machine: StateMachine,
    frame: Option<FrameBufferHandle>,
    metadata: Option<CaptureMetadata>,
}

impl<'a, T: Transport> ExposureCycle<'a, T> {
    /// Creates a cycle with no observer, a fresh cancellation token and an
    /// unbounded readout wait.
    pub fn new(session: &'a mut DeviceSession<T>, sink: &'a mut dyn ArtifactSink) -> Self {
        Self {
            session,
            sink,
            observer: &NOOP_OBSERVER,
            cancel: CancellationToken::new(),
            readout_timeout: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ExposureObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Uses `token` as the abort signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Bounds the wait for the frame buffer to fill.
    pub fn with_readout_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.readout_timeout = timeout;
        self
    }

    /// Runs the cycle to completion.
    ///
    /// Never panics on device errors: failures are reported through
    /// [`CaptureOutcome::Failed`].
    pub fn run(mut self, request: &ExposureRequest) -> CycleReport {
        let started = Instant::now();
        let mut progress = Progress::default();

        let result = self.execute(request, &mut progress);
        self.finalize(&mut progress.frame);

        let result = result.and_then(|completion| {
            progress.machine.advance(CycleState::Done)?;
            Ok(completion)
        });
        let (outcome, artifact) = match result {
            Ok(Completion::Stored(handle)) => (CaptureOutcome::Ok, Some(handle)),
            Ok(Completion::Aborted) => (CaptureOutcome::Aborted, None),
            Err(err) => {
                warn!(state = %progress.machine.current(), error = %err, "exposure cycle failed");
                progress.machine.fail();
                (CaptureOutcome::Failed(err), None)
            }
        };

        let report = CycleReport::new(
            outcome,
            artifact,
            progress.metadata,
            progress.machine.into_trail(),
            request.exposure_time(),
            started.elapsed(),
        );
        self.observer.readout_complete(request, &report);
        report
    }

    fn execute(
        &mut self,
        request: &ExposureRequest,
        progress: &mut Progress,
    ) -> Result<Completion, CycleError> {
        let binning_factor = request.validate_against(self.session.capabilities())?;

        // Arm
        self.session.set_exposure_time(request.exposure_time())?;
        let geometry = self.session.geometry();
        let frame = progress
            .frame
            .insert(FrameBufferHandle::announce(self.session.device_mut(), geometry)?);
        progress.machine.advance(CycleState::Armed)?;

        // Expose
        self.cancel.clear();
        self.observer.exposure_begin(request);
        self.session.start_capture()?;
        frame.queue(self.session.device_mut())?;
        self.session.start_acquisition()?;
        let exposure_started = Instant::now();
        let frame_start_time = Utc::now();
        let temperature = self.session.read_temperature()?;
        let metadata = CaptureMetadata::new(frame_start_time, temperature, binning_factor);
        progress.metadata = Some(metadata.clone());
        progress.machine.advance(CycleState::Exposing)?;
        info!(
            exposure_s = request.exposure_time(),
            temperature_c = temperature,
            frame = %frame.id(),
            "exposing"
        );

        if wait_for_exposure(exposure_started, request.exposure_duration(), &self.cancel)
            == TimerOutcome::Cancelled
        {
            progress.machine.advance(CycleState::Aborting)?;
            info!(
                elapsed_ms = exposure_started.elapsed().as_millis() as u64,
                "exposure aborted"
            );
            // The outcome is fixed from here; teardown errors are only logged.
            swallow("revoke frame", frame.revoke(self.session.device_mut()));
            swallow("stop acquisition", self.session.stop_acquisition());
            swallow("end capture", self.session.end_capture());
            return Ok(Completion::Aborted);
        }

        progress.machine.advance(CycleState::Stopping)?;
        self.session.stop_acquisition()?;

        // Read out
        progress.machine.advance(CycleState::ReadingOut)?;
        frame.wait_filled(self.session.device_mut(), self.readout_timeout)?;
        self.observer.readout_begin(request);
        let pixels = decode_mono8(frame.bytes()?, frame.geometry())?;
        let statistics = PixelStatistics::analyze(&pixels);
        debug!(
            min = statistics.min,
            max = statistics.max,
            mean = statistics.mean,
            "frame decoded"
        );

        let handle = self.sink.store(Artifact {
            pixels,
            metadata,
            statistics,
            exposure_time: request.exposure_time(),
            binning: request.binning(),
        })?;
        Ok(Completion::Stored(handle))
    }

    fn finalize(&mut self, frame: &mut Option<FrameBufferHandle>) {
        if self.session.is_acquiring() {
            swallow("stop acquisition", self.session.stop_acquisition());
        }
        if self.session.capture_engine_running() {
            swallow("end capture", self.session.end_capture());
        }
        if let Some(frame) = frame.as_mut() {
            if frame.is_live() {
                swallow("revoke frame", frame.revoke(self.session.device_mut()));
            }
            swallow("revoke all frames", self.session.revoke_all_frames());
        }
    }
}

fn swallow<E: Display>(step: &'static str, result: Result<(), E>) {
    if let Err(error) = result {
        warn!(step, error = %error, "ignored error during cycle cleanup");
    }
}
