//! Open connection to one physical camera.
//!
//! The session owns the vendor transport and the opened device, translates
//! semantic operations (exposure time, acquisition start/stop, temperature)
//! into feature writes and commands, and keeps the host-side view of
//! whether a capture is in flight.
//!
//! Capture and acquisition are considered active from the moment their
//! start is requested until their stop is requested, whatever the device
//! answers. Cleanup therefore always attempts the matching stop, and never
//! repeats one that was already issued.

use super::features::*;
use super::transport::{Device, DeviceError, FeatureValue, FrameGeometry, Transport};
use crate::capabilities::CapabilityTable;
use crate::instrument::{CameraConfig, PixelFormat};

/// Descriptive information about the opened camera.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Identifier the camera was opened with.
    pub camera_id: String,
    /// `DeviceModelName`.
    pub model: String,
    /// `SensorType`.
    pub sensor_type: String,
    /// Vendor runtime version.
    pub transport_version: String,
    /// Physical interface.
    pub interface: &'static str,
}

/// Owns the connection to one camera.
pub struct DeviceSession<T: Transport> {
    transport: T,
    device: T::Device,
    info: DeviceInfo,
    capabilities: CapabilityTable,
    pixel_format: PixelFormat,
    configured_exposure_us: Option<f64>,
    last_known_temperature: Option<f64>,
    capture_engine: bool,
    acquisition: bool,
    open: bool,
}

impl<T: Transport> DeviceSession<T> {
    /// Starts the transport, discovers cameras and opens one.
    ///
    /// Fails with [`DeviceError::NoDeviceFound`] when discovery returns no
    /// camera. On any failure the transport is shut down again and no
    /// session exists.
    pub fn open(mut transport: T, config: &CameraConfig) -> Result<Self, DeviceError> {
        transport.startup()?;
        let transport_version = transport.version();

        let camera_id = match select_camera(&mut transport, config) {
            Ok(id) => id,
            Err(e) => {
                transport.shutdown();
                return Err(e);
            }
        };

        let mut device = match transport.open_camera(&camera_id) {
            Ok(device) => device,
            Err(e) => {
                transport.shutdown();
                return Err(e);
            }
        };

        let described = configure(&mut device, config).and_then(|()| describe(&mut device));
        let (model, sensor_type, width, height) = match described {
            Ok(description) => description,
            Err(e) => {
                if let Err(close_err) = device.close() {
                    tracing::warn!(error = %close_err, "failed to close camera after setup error");
                }
                transport.shutdown();
                return Err(e);
            }
        };

        let geometry = FrameGeometry::new(width, height, config.pixel_format.bit_depth());
        tracing::info!(
            camera = %camera_id,
            model = %model,
            sensor = %sensor_type,
            width,
            height,
            version = %transport_version,
            "opened camera"
        );

        Ok(Self {
            transport,
            device,
            info: DeviceInfo {
                camera_id,
                model,
                sensor_type,
                transport_version,
                interface: "Ethernet",
            },
            capabilities: CapabilityTable::for_geometry(geometry),
            pixel_format: config.pixel_format,
            configured_exposure_us: None,
            last_known_temperature: None,
            capture_engine: false,
            acquisition: false,
            open: true,
        })
    }

    /// Writes the exposure time, returning the value in microseconds.
    pub fn set_exposure_time(&mut self, seconds: f64) -> Result<f64, DeviceError> {
        self.ensure_open()?;
        let micros = seconds * 1e6;
        self.device
            .write_feature(EXPOSURE_TIME_ABS, FeatureValue::Float(micros))?;
        self.configured_exposure_us = Some(micros);
        tracing::debug!(exposure_us = micros, "exposure time configured");
        Ok(micros)
    }

    /// Starts the host capture engine.
    pub fn start_capture(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.capture_engine = true;
        self.device.start_capture()
    }

    /// Stops the host capture engine.
    pub fn end_capture(&mut self) -> Result<(), DeviceError> {
        self.capture_engine = false;
        self.device.end_capture()
    }

    /// Issues `AcquisitionStart`.
    pub fn start_acquisition(&mut self) -> Result<(), DeviceError> {
        self.ensure_open()?;
        self.acquisition = true;
        self.device.run_command(ACQUISITION_START)
    }

    /// Issues `AcquisitionStop`.
    pub fn stop_acquisition(&mut self) -> Result<(), DeviceError> {
        self.acquisition = false;
        self.device.run_command(ACQUISITION_STOP)
    }

    /// Releases every frame buffer still announced on the device.
    pub fn revoke_all_frames(&mut self) -> Result<(), DeviceError> {
        self.device.revoke_all_frames()
    }

    /// Reads the sensor temperature in °C.
    ///
    /// Callers must not invoke this concurrently with an exposure cycle;
    /// the instrument facade serialises both behind one lock.
    pub fn read_temperature(&mut self) -> Result<f64, DeviceError> {
        self.ensure_open()?;
        let value = self.device.read_feature(DEVICE_TEMPERATURE)?;
        let celsius = value.as_float().ok_or_else(|| DeviceError::TypeMismatch {
            feature: DEVICE_TEMPERATURE.to_string(),
            expected: "float",
        })?;
        self.last_known_temperature = Some(celsius);
        Ok(celsius)
    }

    /// Closes the camera and shuts the transport down.
    ///
    /// Never fails: every step is attempted, secondary errors are logged
    /// and returned for inspection only. Closing twice is a no-op.
    pub fn close(&mut self) -> Vec<DeviceError> {
        if !self.open {
            return Vec::new();
        }
        self.open = false;

        let mut swallowed = Vec::new();
        if self.acquisition {
            swallowed.extend(self.stop_acquisition().err());
        }
        // Ending capture is harmless when none is running.
        swallowed.extend(self.end_capture().err());
        swallowed.extend(self.device.revoke_all_frames().err());
        swallowed.extend(self.device.close().err());
        self.transport.shutdown();

        for error in &swallowed {
            tracing::warn!(error = %error, "ignored error while closing camera");
        }
        tracing::info!(camera = %self.info.camera_id, "closed camera");
        swallowed
    }

    /// Descriptive information about the camera.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Full-frame geometry.
    pub fn geometry(&self) -> FrameGeometry {
        self.capabilities.geometry()
    }

    /// Capability table built at open.
    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Configured pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether a capture is in flight (engine running or acquisition started).
    pub fn is_capturing(&self) -> bool {
        self.capture_engine || self.acquisition
    }

    /// Whether `AcquisitionStart` has been issued without a matching stop.
    pub fn is_acquiring(&self) -> bool {
        self.acquisition
    }

    /// Whether the capture engine is running.
    pub fn capture_engine_running(&self) -> bool {
        self.capture_engine
    }

    /// Last exposure time written, in microseconds.
    pub fn configured_exposure_us(&self) -> Option<f64> {
        self.configured_exposure_us
    }

    /// Last temperature read, in °C.
    pub fn last_known_temperature(&self) -> Option<f64> {
        self.last_known_temperature
    }

    pub(crate) fn device_mut(&mut self) -> &mut T::Device {
        &mut self.device
    }

    fn ensure_open(&self) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::Protocol("session is closed".to_string()))
        }
    }
}

impl<T: Transport> Drop for DeviceSession<T> {
    fn drop(&mut self) {
        if self.open {
            self.close();
        }
    }
}

/// Runs discovery and picks the configured camera, or the first one found.
fn select_camera<T: Transport>(transport: &mut T, config: &CameraConfig) -> Result<String, DeviceError> {
    if transport.gige_present() {
        transport.run_command(GEV_DISCOVERY_ALL_ONCE)?;
        std::thread::sleep(config.discovery_settle());
    }

    let ids = transport.camera_ids()?;
    if let Some(wanted) = &config.camera_id {
        if ids.contains(wanted) {
            return Ok(wanted.clone());
        }
        tracing::warn!(camera = %wanted, "configured camera not found, using first discovered");
    }

    ids.into_iter().next().ok_or(DeviceError::NoDeviceFound)
}

fn configure<D: Device>(device: &mut D, config: &CameraConfig) -> Result<(), DeviceError> {
    let settings = [
        (ACQUISITION_MODE, SINGLE_FRAME),
        (GAIN_AUTO, OFF),
        (EXPOSURE_AUTO, OFF),
        (PIXEL_FORMAT, config.pixel_format.feature_value()),
        (GVSP_DRIVER, config.gvsp_driver.feature_value()),
        (DEVICE_TEMPERATURE_SELECTOR, SENSOR),
    ];
    for (feature, value) in settings {
        device.write_feature(feature, FeatureValue::enumeration(value))?;
    }
    Ok(())
}

fn describe<D: Device>(device: &mut D) -> Result<(String, String, u32, u32), DeviceError> {
    let model = read_string(device, DEVICE_MODEL_NAME)?;
    let sensor_type = read_string(device, SENSOR_TYPE)?;
    let width = read_dimension(device, WIDTH_MAX)?;
    let height = read_dimension(device, HEIGHT_MAX)?;
    Ok((model, sensor_type, width, height))
}

fn read_string<D: Device>(device: &mut D, feature: &str) -> Result<String, DeviceError> {
    device
        .read_feature(feature)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DeviceError::TypeMismatch {
            feature: feature.to_string(),
            expected: "string",
        })
}

fn read_dimension<D: Device>(device: &mut D, feature: &str) -> Result<u32, DeviceError> {
    device
        .read_feature(feature)?
        .as_int()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v > 0)
        .ok_or_else(|| DeviceError::TypeMismatch {
            feature: feature.to_string(),
            expected: "positive integer",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{SimulatedTransport, SimulatorConfig, SimulatorFaults};

    fn quick_config() -> CameraConfig {
        CameraConfig {
            discovery_settle_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_open_configures_device() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        let session = DeviceSession::open(transport, &quick_config()).unwrap();

        assert_eq!(session.info().camera_id, "sim-0");
        assert_eq!(session.info().model, "Manta G-125B");
        assert_eq!(session.geometry(), FrameGeometry::new(8, 4, 8));
        assert!(!session.is_capturing());

        assert_eq!(probe.feature(ACQUISITION_MODE), Some(FeatureValue::enumeration("SingleFrame")));
        assert_eq!(probe.feature(GAIN_AUTO), Some(FeatureValue::enumeration("Off")));
        assert_eq!(probe.feature(EXPOSURE_AUTO), Some(FeatureValue::enumeration("Off")));
        assert_eq!(probe.feature(PIXEL_FORMAT), Some(FeatureValue::enumeration("Mono8")));
        assert_eq!(probe.feature(GVSP_DRIVER), Some(FeatureValue::enumeration("Socket")));
        assert_eq!(probe.stats().discovery_runs, 1);
    }

    #[test]
    fn test_open_without_cameras() {
        let transport = SimulatedTransport::new(SimulatorConfig::small().without_cameras());
        let probe = transport.probe();

        let result = DeviceSession::open(transport, &quick_config());
        assert!(matches!(result, Err(DeviceError::NoDeviceFound)));

        let stats = probe.stats();
        assert_eq!(stats.opened_cameras, 0);
        assert_eq!(stats.shutdowns, 1);
    }

    #[test]
    fn test_prefers_configured_camera() {
        let sim = SimulatorConfig {
            camera_ids: vec!["a".into(), "b".into()],
            ..SimulatorConfig::small()
        };
        let config = CameraConfig {
            camera_id: Some("b".into()),
            ..quick_config()
        };
        let session = DeviceSession::open(SimulatedTransport::new(sim.clone()), &config).unwrap();
        assert_eq!(session.info().camera_id, "b");

        let missing = CameraConfig {
            camera_id: Some("zzz".into()),
            ..quick_config()
        };
        let session = DeviceSession::open(SimulatedTransport::new(sim), &missing).unwrap();
        assert_eq!(session.info().camera_id, "a");
    }

    #[test]
    fn test_exposure_time_in_microseconds() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        let mut session = DeviceSession::open(transport, &quick_config()).unwrap();

        let micros = session.set_exposure_time(0.05).unwrap();
        assert!((micros - 50_000.0).abs() < 1e-6);
        assert_eq!(session.configured_exposure_us(), Some(micros));
        assert_eq!(probe.feature(EXPOSURE_TIME_ABS), Some(FeatureValue::Float(micros)));
    }

    #[test]
    fn test_setup_failure_shuts_transport_down() {
        let transport = SimulatedTransport::new(SimulatorConfig::small())
            .with_faults(SimulatorFaults::default().reject_feature(PIXEL_FORMAT));
        let probe = transport.probe();

        let result = DeviceSession::open(transport, &quick_config());
        assert!(matches!(result, Err(DeviceError::Config { .. })));
        let stats = probe.stats();
        assert_eq!(stats.closed_cameras, 1);
        assert_eq!(stats.shutdowns, 1);
    }

    #[test]
    fn test_close_never_fails_and_is_idempotent() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        let mut session = DeviceSession::open(transport, &quick_config()).unwrap();
        session.start_capture().unwrap();

        probe.set_faults(SimulatorFaults {
            fail_end_capture: true,
            ..Default::default()
        });
        let swallowed = session.close();
        assert_eq!(swallowed.len(), 1);
        assert!(!session.is_open());
        assert!(session.close().is_empty());

        let stats = probe.stats();
        assert_eq!(stats.closed_cameras, 1);
        assert_eq!(stats.shutdowns, 1);
        assert!(session.read_temperature().is_err());
    }

    #[test]
    fn test_drop_closes_open_session() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        drop(DeviceSession::open(transport, &quick_config()).unwrap());
        assert_eq!(probe.stats().shutdowns, 1);
    }

    #[test]
    fn test_temperature_recorded() {
        let transport = SimulatedTransport::new(SimulatorConfig::small());
        let mut session = DeviceSession::open(transport, &quick_config()).unwrap();
        assert_eq!(session.last_known_temperature(), None);
        let celsius = session.read_temperature().unwrap();
        assert_eq!(session.last_known_temperature(), Some(celsius));
    }
}
