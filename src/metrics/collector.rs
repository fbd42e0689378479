//! Metrics collection and registry.

use crate::exposure::{CaptureOutcome, CycleReport};
use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus metrics registry for exposure cycles.
///
/// Clones share the underlying metrics.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,

    // Outcome counters
    cycles_ok: IntCounter,
    cycles_aborted: IntCounter,
    cycles_failed: IntCounter,
    artifacts_stored: IntCounter,

    // Last cycle
    last_exposure_seconds: Gauge,
    last_frame_temperature: Gauge,
    last_cycle_duration: Gauge,
}

impl MetricsRegistry {
    /// Creates a new registry with all cycle metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let cycles_ok = IntCounter::new(
            "gige_exposure_cycles_ok_total",
            "Exposure cycles that produced a frame",
        )?;
        let cycles_aborted = IntCounter::new(
            "gige_exposure_cycles_aborted_total",
            "Exposure cycles cancelled while exposing",
        )?;
        let cycles_failed = IntCounter::new(
            "gige_exposure_cycles_failed_total",
            "Exposure cycles that failed",
        )?;
        let artifacts_stored = IntCounter::new(
            "gige_exposure_artifacts_stored_total",
            "Artifacts handed to the sink",
        )?;

        let last_exposure_seconds = Gauge::new(
            "gige_exposure_last_exposure_seconds",
            "Requested exposure time of the last cycle",
        )?;
        let last_frame_temperature = Gauge::new(
            "gige_exposure_last_frame_temperature_celsius",
            "Sensor temperature sampled at the start of the last exposure",
        )?;
        let last_cycle_duration = Gauge::new(
            "gige_exposure_last_cycle_duration_seconds",
            "Wall-clock duration of the last cycle",
        )?;

        registry.register(Box::new(cycles_ok.clone()))?;
        registry.register(Box::new(cycles_aborted.clone()))?;
        registry.register(Box::new(cycles_failed.clone()))?;
        registry.register(Box::new(artifacts_stored.clone()))?;
        registry.register(Box::new(last_exposure_seconds.clone()))?;
        registry.register(Box::new(last_frame_temperature.clone()))?;
        registry.register(Box::new(last_cycle_duration.clone()))?;

        Ok(Self {
            registry,
            cycles_ok,
            cycles_aborted,
            cycles_failed,
            artifacts_stored,
            last_exposure_seconds,
            last_frame_temperature,
            last_cycle_duration,
        })
    }

    /// Records a finished cycle.
    pub fn record_cycle(&self, report: &CycleReport) {
        match report.outcome() {
            CaptureOutcome::Ok => self.cycles_ok.inc(),
            CaptureOutcome::Aborted => self.cycles_aborted.inc(),
            CaptureOutcome::Failed(_) => self.cycles_failed.inc(),
        }
        if report.artifact().is_some() {
            self.artifacts_stored.inc();
        }

        self.last_exposure_seconds.set(report.exposure_time());
        self.last_cycle_duration.set(report.duration().as_secs_f64());
        // Only cycles that reached the exposing state sampled a temperature.
        if let Some(metadata) = report.metadata() {
            self.last_frame_temperature.set(metadata.frame_temperature());
        }
    }

    /// Total cycles recorded, whatever their outcome.
    pub fn cycles_recorded(&self) -> u64 {
        self.cycles_ok.get() + self.cycles_aborted.get() + self.cycles_failed.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
