//! Simulated GigE camera.
//!
//! Implements [`Transport`] and [`Device`] entirely in memory so the
//! exposure cycle can be driven without hardware. A [`SimulatorProbe`]
//! shares state with every simulated device and exposes resource
//! accounting (announced/revoked buffers, capture flags, call counts)
//! and fault injection.

use super::features::*;
use super::transport::{Device, DeviceError, FeatureValue, FilledFrame, FrameId, Transport};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Version reported by the simulated vendor runtime.
pub const SIMULATOR_VERSION: &str = "sim-1.2.0";

/// Configuration of the simulated camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Identifiers returned by discovery.
    pub camera_ids: Vec<String>,
    /// Reported `DeviceModelName`.
    pub model: String,
    /// Reported `SensorType`.
    pub sensor_type: String,
    /// Sensor width in pixels (`WidthMax`).
    pub width: u32,
    /// Sensor height in pixels (`HeightMax`).
    pub height: u32,
    /// Temperature returned by the first read, in °C.
    pub base_temperature: f64,
    /// Temperature change applied after every read, in °C.
    pub temperature_step: f64,
    /// Bias level added to every pixel.
    pub bias_level: u8,
    /// Peak amplitude of the uniform read noise.
    pub noise_amplitude: u8,
    /// Noise seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            camera_ids: vec!["DEV_000F315B9C01".to_string()],
            model: "Manta G-125B".to_string(),
            sensor_type: "CCD".to_string(),
            width: 1292,
            height: 964,
            base_temperature: 32.5,
            temperature_step: 0.0,
            bias_level: 12,
            noise_amplitude: 8,
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Tiny deterministic sensor, handy for tests.
    pub fn small() -> Self {
        Self {
            camera_ids: vec!["sim-0".to_string()],
            width: 8,
            height: 4,
            seed: Some(7),
            ..Default::default()
        }
    }

    /// Same configuration with no discoverable cameras.
    pub fn without_cameras(mut self) -> Self {
        self.camera_ids.clear();
        self
    }
}

/// Faults the simulator can inject.
#[derive(Debug, Clone, Default)]
pub struct SimulatorFaults {
    /// Feature reads and writes to these names are rejected.
    pub reject_features: HashSet<String>,
    /// These commands are rejected.
    pub reject_commands: HashSet<String>,
    /// Filled frames never arrive.
    pub stall_readout: bool,
    /// Filled frames are cut to this many bytes.
    pub truncate_frame: Option<usize>,
    /// `end_capture` fails.
    pub fail_end_capture: bool,
}

impl SimulatorFaults {
    /// Rejects reads and writes of `feature`.
    pub fn reject_feature(mut self, feature: &str) -> Self {
        self.reject_features.insert(feature.to_string());
        self
    }

    /// Rejects invocations of `command`.
    pub fn reject_command(mut self, command: &str) -> Self {
        self.reject_commands.insert(command.to_string());
        self
    }
}

/// Resource accounting collected by the simulator.
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub startups: usize,
    pub shutdowns: usize,
    pub discovery_runs: usize,
    pub opened_cameras: usize,
    pub closed_cameras: usize,
    pub announced: usize,
    pub revoked: usize,
    /// Revocations of buffers that were not announced.
    pub double_revokes: usize,
    pub live_frames: usize,
    pub frames_filled: usize,
    pub capture_active: bool,
    pub acquisition_active: bool,
    pub start_capture_calls: usize,
    pub end_capture_calls: usize,
    pub acquisition_starts: usize,
    pub acquisition_stops: usize,
    pub temperature_reads: usize,
    /// Every accepted feature write, in order.
    pub feature_writes: Vec<(String, FeatureValue)>,
}

#[derive(Debug)]
struct SimFrame {
    len: usize,
    queued: bool,
}

#[derive(Debug, Default)]
struct SimState {
    faults: SimulatorFaults,
    stats: SimulatorStats,
    features: HashMap<String, FeatureValue>,
    frames: BTreeMap<FrameId, SimFrame>,
    next_frame: u64,
    acquisition_started: Option<Instant>,
}

impl SimState {
    fn sync_live(&mut self) {
        self.stats.live_frames = self.frames.len();
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared view into the simulator state.
#[derive(Debug, Clone)]
pub struct SimulatorProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimulatorProbe {
    /// Snapshot of the accounting counters.
    pub fn stats(&self) -> SimulatorStats {
        lock(&self.state).stats.clone()
    }

    /// Replaces the active faults.
    pub fn set_faults(&self, faults: SimulatorFaults) {
        lock(&self.state).faults = faults;
    }

    /// Clears all active faults.
    pub fn clear_faults(&self) {
        self.set_faults(SimulatorFaults::default());
    }

    /// Last value written to a feature.
    pub fn feature(&self, name: &str) -> Option<FeatureValue> {
        lock(&self.state).features.get(name).cloned()
    }
}

/// Simulated vendor system object.
pub struct SimulatedTransport {
    config: SimulatorConfig,
    state: Arc<Mutex<SimState>>,
    started: bool,
}

impl SimulatedTransport {
    /// Creates a transport that discovers the configured cameras.
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimState::default())),
            started: false,
        }
    }

    /// Installs faults before the transport is used.
    pub fn with_faults(self, faults: SimulatorFaults) -> Self {
        lock(&self.state).faults = faults;
        self
    }

    /// Returns a probe sharing this transport's state.
    pub fn probe(&self) -> SimulatorProbe {
        SimulatorProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn rng(&self) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => {
                let mut seed = [0u8; 32];
                rand_core::OsRng.fill_bytes(&mut seed);
                ChaCha20Rng::from_seed(seed)
            }
        }
    }
}

impl Transport for SimulatedTransport {
    type Device = SimulatedCamera;

    fn startup(&mut self) -> Result<(), DeviceError> {
        lock(&self.state).stats.startups += 1;
        self.started = true;
        Ok(())
    }

    fn version(&self) -> String {
        SIMULATOR_VERSION.to_string()
    }

    fn gige_present(&self) -> bool {
        true
    }

    fn run_command(&mut self, command: &str) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if state.faults.reject_commands.contains(command) || command != GEV_DISCOVERY_ALL_ONCE {
            return Err(DeviceError::Command {
                command: command.to_string(),
                reason: "rejected by transport".to_string(),
            });
        }
        state.stats.discovery_runs += 1;
        Ok(())
    }

    fn camera_ids(&mut self) -> Result<Vec<String>, DeviceError> {
        if !self.started {
            return Err(DeviceError::Protocol("transport not started".to_string()));
        }
        Ok(self.config.camera_ids.clone())
    }

    fn open_camera(&mut self, id: &str) -> Result<SimulatedCamera, DeviceError> {
        if !self.config.camera_ids.iter().any(|known| known == id) {
            return Err(DeviceError::Protocol(format!("camera {id} is not reachable")));
        }
        lock(&self.state).stats.opened_cameras += 1;
        tracing::debug!(camera = id, "simulated camera opened");

        Ok(SimulatedCamera {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            rng: self.rng(),
        })
    }

    fn shutdown(&mut self) {
        lock(&self.state).stats.shutdowns += 1;
        self.started = false;
    }
}

/// One simulated camera.
pub struct SimulatedCamera {
    config: SimulatorConfig,
    state: Arc<Mutex<SimState>>,
    rng: ChaCha20Rng,
}

impl SimulatedCamera {
    fn render(&mut self, exposure_seconds: f64, len: usize) -> Vec<u8> {
        // Dark current grows linearly with exposure.
        let dark = (exposure_seconds * 20.0).min(200.0);
        let amplitude = u32::from(self.config.noise_amplitude) + 1;
        (0..len)
            .map(|_| {
                let noise = (self.rng.next_u32() % amplitude) as f64;
                (f64::from(self.config.bias_level) + dark + noise).min(255.0) as u8
            })
            .collect()
    }
}

fn is_read_only(name: &str) -> bool {
    matches!(
        name,
        WIDTH_MAX | HEIGHT_MAX | DEVICE_MODEL_NAME | SENSOR_TYPE | DEVICE_TEMPERATURE
    )
}

impl Device for SimulatedCamera {
    fn write_feature(&mut self, name: &str, value: FeatureValue) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if state.faults.reject_features.contains(name) {
            return Err(DeviceError::Config {
                feature: name.to_string(),
                reason: "rejected by device".to_string(),
            });
        }
        if is_read_only(name) {
            return Err(DeviceError::Config {
                feature: name.to_string(),
                reason: "feature is read-only".to_string(),
            });
        }
        if name == EXPOSURE_TIME_ABS && value.as_float().map_or(true, |us| us <= 0.0) {
            return Err(DeviceError::Config {
                feature: name.to_string(),
                reason: format!("{value} is out of range"),
            });
        }
        state.stats.feature_writes.push((name.to_string(), value.clone()));
        state.features.insert(name.to_string(), value);
        Ok(())
    }

    fn read_feature(&mut self, name: &str) -> Result<FeatureValue, DeviceError> {
        let mut state = lock(&self.state);
        if state.faults.reject_features.contains(name) {
            return Err(DeviceError::Config {
                feature: name.to_string(),
                reason: "rejected by device".to_string(),
            });
        }
        let value = match name {
            DEVICE_TEMPERATURE => {
                let reads = state.stats.temperature_reads as f64;
                state.stats.temperature_reads += 1;
                FeatureValue::Float(self.config.base_temperature + reads * self.config.temperature_step)
            }
            WIDTH_MAX => FeatureValue::Int(i64::from(self.config.width)),
            HEIGHT_MAX => FeatureValue::Int(i64::from(self.config.height)),
            DEVICE_MODEL_NAME => FeatureValue::enumeration(self.config.model.clone()),
            SENSOR_TYPE => FeatureValue::enumeration(self.config.sensor_type.clone()),
            other => state
                .features
                .get(other)
                .cloned()
                .ok_or_else(|| DeviceError::UnknownFeature(other.to_string()))?,
        };
        Ok(value)
    }

    fn run_command(&mut self, name: &str) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if state.faults.reject_commands.contains(name) {
            return Err(DeviceError::Command {
                command: name.to_string(),
                reason: "rejected by device".to_string(),
            });
        }
        match name {
            ACQUISITION_START => {
                state.stats.acquisition_active = true;
                state.stats.acquisition_starts += 1;
                state.acquisition_started = Some(Instant::now());
            }
            ACQUISITION_STOP => {
                state.stats.acquisition_active = false;
                state.stats.acquisition_stops += 1;
            }
            other => {
                return Err(DeviceError::Command {
                    command: other.to_string(),
                    reason: "unknown command".to_string(),
                })
            }
        }
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.stats.capture_active = true;
        state.stats.start_capture_calls += 1;
        Ok(())
    }

    fn end_capture(&mut self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.stats.end_capture_calls += 1;
        if state.faults.fail_end_capture {
            return Err(DeviceError::Protocol("end capture failed".to_string()));
        }
        state.stats.capture_active = false;
        Ok(())
    }

    fn announce_frame(&mut self, len: usize) -> Result<FrameId, DeviceError> {
        let mut state = lock(&self.state);
        let id = FrameId(state.next_frame);
        state.next_frame += 1;
        state.frames.insert(id, SimFrame { len, queued: false });
        state.stats.announced += 1;
        state.sync_live();
        Ok(id)
    }

    fn queue_frame(&mut self, frame: FrameId) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if !state.stats.capture_active {
            return Err(DeviceError::Protocol("capture engine not started".to_string()));
        }
        let slot = state
            .frames
            .get_mut(&frame)
            .ok_or_else(|| DeviceError::Protocol(format!("{frame} is not announced")))?;
        slot.queued = true;
        Ok(())
    }

    fn wait_frame(
        &mut self,
        frame: FrameId,
        timeout: Option<Duration>,
    ) -> Result<FilledFrame, DeviceError> {
        let (len, ready_at, exposure_seconds, truncate) = {
            let state = lock(&self.state);
            let slot = state
                .frames
                .get(&frame)
                .ok_or_else(|| DeviceError::Protocol(format!("{frame} is not announced")))?;
            if !slot.queued {
                return Err(DeviceError::Protocol(format!("{frame} is not queued")));
            }
            let len = slot.len;

            if state.faults.stall_readout {
                drop(state);
                // A stalled device without a timeout would block forever.
                return match timeout {
                    Some(limit) => {
                        std::thread::sleep(limit);
                        Err(DeviceError::Timeout)
                    }
                    None => Err(DeviceError::Protocol("device stalled".to_string())),
                };
            }

            let started = state
                .acquisition_started
                .ok_or_else(|| DeviceError::Protocol("acquisition never started".to_string()))?;
            let exposure_seconds = state
                .features
                .get(EXPOSURE_TIME_ABS)
                .and_then(FeatureValue::as_float)
                .unwrap_or(0.0)
                / 1e6;
            let ready_at = started + Duration::from_secs_f64(exposure_seconds);
            (len, ready_at, exposure_seconds, state.faults.truncate_frame)
        };

        let remaining = ready_at.saturating_duration_since(Instant::now());
        if let Some(limit) = timeout {
            if remaining > limit {
                std::thread::sleep(limit);
                return Err(DeviceError::Timeout);
            }
        }
        std::thread::sleep(remaining);

        let pixels = (self.config.width as usize) * (self.config.height as usize);
        let mut bytes = self.render(exposure_seconds, pixels.min(len));
        if let Some(limit) = truncate {
            bytes.truncate(limit);
        }

        let mut state = lock(&self.state);
        if let Some(slot) = state.frames.get_mut(&frame) {
            slot.queued = false;
        }
        state.stats.frames_filled += 1;

        Ok(FilledFrame {
            width: self.config.width,
            height: self.config.height,
            bytes,
        })
    }

    fn revoke_frame(&mut self, frame: FrameId) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        if state.frames.remove(&frame).is_none() {
            state.stats.double_revokes += 1;
            return Err(DeviceError::Protocol(format!("{frame} is not announced")));
        }
        state.stats.revoked += 1;
        state.sync_live();
        Ok(())
    }

    fn revoke_all_frames(&mut self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        let outstanding = state.frames.len();
        state.frames.clear();
        state.stats.revoked += outstanding;
        state.sync_live();
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        lock(&self.state).stats.closed_cameras += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (SimulatedCamera, SimulatorProbe) {
        let mut transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        transport.startup().unwrap();
        (transport.open_camera("sim-0").unwrap(), probe)
    }

    #[test]
    fn test_discovery_requires_startup() {
        let mut transport = SimulatedTransport::new(SimulatorConfig::small());
        assert!(transport.camera_ids().is_err());

        transport.startup().unwrap();
        transport.run_command(GEV_DISCOVERY_ALL_ONCE).unwrap();
        assert_eq!(transport.camera_ids().unwrap(), vec!["sim-0".to_string()]);
        assert_eq!(transport.probe().stats().discovery_runs, 1);
    }

    #[test]
    fn test_temperature_steps_per_read() {
        let mut transport = SimulatedTransport::new(SimulatorConfig {
            base_temperature: 20.0,
            temperature_step: 0.5,
            ..SimulatorConfig::small()
        });
        transport.startup().unwrap();
        let mut camera = transport.open_camera("sim-0").unwrap();

        assert_eq!(camera.read_feature(DEVICE_TEMPERATURE).unwrap(), FeatureValue::Float(20.0));
        assert_eq!(camera.read_feature(DEVICE_TEMPERATURE).unwrap(), FeatureValue::Float(20.5));
        assert_eq!(transport.probe().stats().temperature_reads, 2);
    }

    #[test]
    fn test_rejected_feature_write() {
        let (mut camera, probe) = open();
        probe.set_faults(SimulatorFaults::default().reject_feature(EXPOSURE_TIME_ABS));

        let err = camera
            .write_feature(EXPOSURE_TIME_ABS, FeatureValue::Float(1000.0))
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(probe.feature(EXPOSURE_TIME_ABS).is_none());
    }

    #[test]
    fn test_seeded_frames_are_reproducible() {
        let capture = || {
            let (mut camera, _probe) = open();
            camera.write_feature(EXPOSURE_TIME_ABS, FeatureValue::Float(1.0)).unwrap();
            let id = camera.announce_frame(32).unwrap();
            camera.start_capture().unwrap();
            camera.queue_frame(id).unwrap();
            camera.run_command(ACQUISITION_START).unwrap();
            camera.wait_frame(id, None).unwrap().bytes
        };

        let first = capture();
        assert_eq!(first.len(), 32);
        assert_eq!(first, capture());
    }

    #[test]
    fn test_revoking_unknown_frame_is_counted() {
        let (mut camera, probe) = open();
        let id = camera.announce_frame(8).unwrap();
        camera.revoke_frame(id).unwrap();
        assert!(camera.revoke_frame(id).is_err());

        let stats = probe.stats();
        assert_eq!(stats.revoked, 1);
        assert_eq!(stats.double_revokes, 1);
        assert_eq!(stats.live_frames, 0);
    }

    #[test]
    fn test_stalled_readout_times_out() {
        let (mut camera, probe) = open();
        probe.set_faults(SimulatorFaults {
            stall_readout: true,
            ..Default::default()
        });
        let id = camera.announce_frame(32).unwrap();
        camera.start_capture().unwrap();
        camera.queue_frame(id).unwrap();

        let err = camera
            .wait_frame(id, Some(Duration::from_millis(5)))
            .unwrap_err();
        assert_eq!(err, DeviceError::Timeout);
    }
}
