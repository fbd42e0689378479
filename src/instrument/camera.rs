//! Instrument-facing camera.
//!
//! [`Camera`] is what the surrounding instrument framework talks to. One
//! lock guards the session, so exposure cycles never overlap and a
//! temperature read never runs during a cycle. Aborting does not take the
//! lock: it only raises the shared cancellation token.

use super::config::{CameraConfig, ConfigError};
use crate::artifact::ArtifactSink;
use crate::capabilities::{CameraFeature, CapabilityTable};
use crate::device::{DeviceError, DeviceInfo, DeviceSession, FrameGeometry, Transport};
use crate::exposure::{
    CancellationToken, CycleReport, ExposureCycle, ExposureObserver, ExposureRequest, ObserverSet,
};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the camera facade.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("camera is not open")]
    NotOpen,
    #[error("camera lock poisoned by a panicking cycle")]
    Poisoned,
    #[error("invalid camera configuration: {0}")]
    Config(#[from] ConfigError),
}

struct Active<T: Transport> {
    session: DeviceSession<T>,
    sink: Box<dyn ArtifactSink>,
}

/// An opened camera ready to run exposure cycles.
pub struct Camera<T: Transport> {
    active: Mutex<Option<Active<T>>>,
    info: DeviceInfo,
    capabilities: CapabilityTable,
    observers: ObserverSet,
    cancel: CancellationToken,
    readout_timeout: Option<Duration>,
}

impl<T: Transport> Camera<T> {
    /// Opens the camera and hands completed frames to `sink`.
    ///
    /// Returns [`DeviceError::NoDeviceFound`] (wrapped) when discovery finds
    /// no camera.
    pub fn open(
        transport: T,
        config: &CameraConfig,
        sink: impl ArtifactSink + 'static,
    ) -> Result<Self, CameraError> {
        config.validate()?;
        let session = DeviceSession::open(transport, config)?;

        Ok(Self {
            info: session.info().clone(),
            capabilities: session.capabilities().clone(),
            active: Mutex::new(Some(Active {
                session,
                sink: Box::new(sink),
            })),
            observers: ObserverSet::new(),
            cancel: CancellationToken::new(),
            readout_timeout: config.readout_timeout(),
        })
    }

    /// Registers an observer notified on every cycle.
    pub fn add_observer(&mut self, observer: impl ExposureObserver + Send + Sync + 'static) {
        self.observers.push(observer);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Active<T>>>, CameraError> {
        self.active.lock().map_err(|_| CameraError::Poisoned)
    }

    /// Runs one exposure cycle.
    ///
    /// Blocks while another cycle or temperature read is in progress.
    /// Device failures during the cycle are reported in the returned
    /// [`CycleReport`]; the `Err` case is reserved for a closed camera.
    pub fn run_cycle(&self, request: &ExposureRequest) -> Result<CycleReport, CameraError> {
        let mut guard = self.lock()?;
        let active = guard.as_mut().ok_or(CameraError::NotOpen)?;

        Ok(ExposureCycle::new(&mut active.session, active.sink.as_mut())
            .with_observer(&self.observers)
            .with_cancellation(self.cancel.clone())
            .with_readout_timeout(self.readout_timeout)
            .run(request))
    }

    /// Reads the sensor temperature in °C.
    pub fn temperature(&self) -> Result<f64, CameraError> {
        let mut guard = self.lock()?;
        let active = guard.as_mut().ok_or(CameraError::NotOpen)?;
        Ok(active.session.read_temperature()?)
    }

    /// Requests cancellation of the exposure in progress.
    ///
    /// Has no effect once the cycle has left the exposing state.
    pub fn abort_exposure(&self) {
        tracing::info!("exposure abort requested");
        self.cancel.cancel();
    }

    /// Token shared with every cycle; cancelling it aborts the current exposure.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Full-frame geometry of the sensor.
    pub fn geometry(&self) -> FrameGeometry {
        self.capabilities.geometry()
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn supports(&self, feature: CameraFeature) -> bool {
        self.capabilities.supports(feature)
    }

    /// Always false: the camera has no cooler.
    pub fn is_cooling(&self) -> bool {
        false
    }

    /// Always false: the camera has no fan.
    pub fn is_fanning(&self) -> bool {
        false
    }

    pub fn is_open(&self) -> bool {
        matches!(self.lock().as_deref(), Ok(Some(_)))
    }

    /// Closes the camera. Errors during shutdown are logged and swallowed;
    /// closing twice is a no-op.
    pub fn close(&self) {
        let taken = match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut active) = taken {
            active.session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemorySink;
    use crate::capabilities::Binning;
    use crate::device::{SimulatedTransport, SimulatorConfig, SimulatorProbe};
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn config() -> CameraConfig {
        CameraConfig {
            discovery_settle_ms: 0,
            ..CameraConfig::default()
        }
    }

    fn open() -> (Camera<SimulatedTransport>, SimulatorProbe, MemorySink) {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        let sink = MemorySink::new();
        let camera = Camera::open(transport, &config(), sink.clone()).unwrap();
        (camera, probe, sink)
    }

    #[test]
    fn test_no_device_found() {
        let transport = SimulatedTransport::new(SimulatorConfig::small().without_cameras());
        let probe = transport.probe();

        let result = Camera::open(transport, &config(), MemorySink::new());

        assert!(matches!(
            result,
            Err(CameraError::Device(DeviceError::NoDeviceFound))
        ));
        assert_eq!(probe.stats().shutdowns, 1);
    }

    #[test]
    fn test_invalid_config_rejected_before_open() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        let config = CameraConfig {
            readout_timeout_ms: Some(0),
            ..config()
        };

        let result = Camera::open(transport, &config, MemorySink::new());

        assert!(matches!(result, Err(CameraError::Config(_))));
        assert_eq!(probe.stats().startups, 0);
    }

    #[test]
    fn test_capabilities_and_geometry() {
        let (camera, _probe, _sink) = open();

        assert_eq!(camera.geometry(), FrameGeometry::new(8, 4, 8));
        assert_eq!(camera.capabilities().binning_factor(Binning::FULL), Some(1));
        assert!(!camera.supports(CameraFeature::TemperatureControl));
        assert!(!camera.is_cooling());
        assert!(!camera.is_fanning());
        assert_eq!(camera.info().camera_id, "sim-0");
    }

    #[test]
    fn test_cycle_stores_artifact() {
        let (camera, _probe, sink) = open();
        let request = ExposureRequest::new(0.02, Binning::FULL).unwrap();

        let report = camera.run_cycle(&request).unwrap();

        assert!(report.outcome().is_ok());
        assert!(sink.get(report.artifact().unwrap()).is_some());
    }

    #[test]
    fn test_abort_from_another_thread() {
        let (camera, _probe, sink) = open();
        let camera = Arc::new(camera);
        let remote = Arc::clone(&camera);
        let aborter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.abort_exposure();
        });

        let request = ExposureRequest::new(5.0, Binning::FULL).unwrap();
        let report = camera.run_cycle(&request).unwrap();
        aborter.join().unwrap();

        assert!(report.outcome().is_aborted());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_temperature_waits_for_running_cycle() {
        let (camera, probe, _sink) = open();
        let camera = Arc::new(camera);
        let worker = Arc::clone(&camera);
        let exposure = Duration::from_millis(150);
        let cycle = thread::spawn(move || {
            let request = ExposureRequest::new(exposure.as_secs_f64(), Binning::FULL).unwrap();
            worker.run_cycle(&request).unwrap()
        });

        // Give the cycle time to take the lock.
        thread::sleep(Duration::from_millis(30));
        let asked = Instant::now();
        let temperature = camera.temperature().unwrap();
        let report = cycle.join().unwrap();

        assert!(report.outcome().is_ok());
        assert_eq!(temperature, 32.5);
        assert!(asked.elapsed() >= Duration::from_millis(50));
        assert_eq!(probe.stats().temperature_reads, 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (camera, probe, _sink) = open();
        assert!(camera.is_open());

        camera.close();
        camera.close();

        assert!(!camera.is_open());
        assert_eq!(probe.stats().closed_cameras, 1);
        assert_eq!(probe.stats().shutdowns, 1);

        let request = ExposureRequest::new(0.01, Binning::FULL).unwrap();
        assert!(matches!(camera.run_cycle(&request), Err(CameraError::NotOpen)));
        assert!(matches!(camera.temperature(), Err(CameraError::NotOpen)));
    }
}
