//! Cycle notification hooks.

use super::outcome::CycleReport;
use super::request::ExposureRequest;
use tracing::info;

/// Receives notifications at fixed points of every cycle.
///
/// Hooks run synchronously on the cycle thread; a slow observer delays the
/// cycle. All methods default to doing nothing.
pub trait ExposureObserver {
    /// Called just before acquisition starts.
    fn exposure_begin(&self, _request: &ExposureRequest) {}

    /// Called once the frame buffer has been filled.
    fn readout_begin(&self, _request: &ExposureRequest) {}

    /// Called after finalize, for every outcome.
    fn readout_complete(&self, _request: &ExposureRequest, _report: &CycleReport) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExposureObserver for NoopObserver {}

/// Logs each notification at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl ExposureObserver for LoggingObserver {
    fn exposure_begin(&self, request: &ExposureRequest) {
        info!(
            exposure_s = request.exposure_time(),
            binning = %request.binning(),
            "exposure started"
        );
    }

    fn readout_begin(&self, request: &ExposureRequest) {
        info!(exposure_s = request.exposure_time(), "readout started");
    }

    fn readout_complete(&self, _request: &ExposureRequest, report: &CycleReport) {
        match report.artifact() {
            Some(artifact) => info!(
                outcome = report.outcome().label(),
                artifact = artifact.id(),
                duration_ms = report.duration().as_millis() as u64,
                "cycle complete"
            ),
            None => info!(
                outcome = report.outcome().label(),
                duration_ms = report.duration().as_millis() as u64,
                "cycle complete"
            ),
        }
    }
}

/// Fans notifications out to several observers, in registration order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn ExposureObserver + Send + Sync>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: impl ExposureObserver + Send + Sync + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ExposureObserver for ObserverSet {
    fn exposure_begin(&self, request: &ExposureRequest) {
        for observer in &self.observers {
            observer.exposure_begin(request);
        }
    }

    fn readout_begin(&self, request: &ExposureRequest) {
        for observer in &self.observers {
            observer.readout_begin(request);
        }
    }

    fn readout_complete(&self, request: &ExposureRequest, report: &CycleReport) {
        for observer in &self.observers {
            observer.readout_complete(request, report);
        }
    }
}
