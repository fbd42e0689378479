//! Device-side capture buffer lifecycle.
//!
//! A buffer moves strictly forward through
//! `Announced → Queued → Filled`, and may be revoked from any live state.
//! Any other call order is rejected with [`BufferError::InvalidState`],
//! which also covers double revocation and use after revocation.

use super::transport::{Device, DeviceError, FrameGeometry, FrameId};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle state of a [`FrameBufferHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Announced,
    Queued,
    Filled,
    Revoked,
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferState::Announced => "announced",
            BufferState::Queued => "queued",
            BufferState::Filled => "filled",
            BufferState::Revoked => "revoked",
        };
        f.write_str(name)
    }
}

/// Errors from buffer operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("invalid buffer state: cannot {operation} a {state} buffer")]
    InvalidState {
        operation: &'static str,
        state: BufferState,
    },
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// One device-allocated capture buffer.
///
/// Owns the raw pixel bytes once filled, until revoked.
pub struct FrameBufferHandle {
    id: FrameId,
    geometry: FrameGeometry,
    state: BufferState,
    bytes: Vec<u8>,
}

impl FrameBufferHandle {
    /// Allocates a buffer sized for `geometry` and announces it to the device.
    pub fn announce<D: Device>(
        device: &mut D,
        geometry: FrameGeometry,
    ) -> Result<Self, BufferError> {
        let id = device.announce_frame(geometry.byte_len())?;
        tracing::debug!(frame = %id, bytes = geometry.byte_len(), "announced frame buffer");
        Ok(Self {
            id,
            geometry,
            state: BufferState::Announced,
            bytes: Vec::new(),
        })
    }

    /// Submits the buffer for the device's next capture.
    pub fn queue<D: Device>(&mut self, device: &mut D) -> Result<(), BufferError> {
        self.expect_state("queue", BufferState::Announced)?;
        device.queue_frame(self.id)?;
        self.state = BufferState::Queued;
        Ok(())
    }

    /// Blocks until the device fills the buffer.
    ///
    /// On error the buffer stays queued so it can still be revoked.
    pub fn wait_filled<D: Device>(
        &mut self,
        device: &mut D,
        timeout: Option<Duration>,
    ) -> Result<(), BufferError> {
        self.expect_state("wait on", BufferState::Queued)?;
        let filled = device.wait_frame(self.id, timeout)?;

        if filled.width != self.geometry.width || filled.height != self.geometry.height {
            tracing::debug!(
                frame = %self.id,
                width = filled.width,
                height = filled.height,
                "device reported a different frame geometry"
            );
        }
        self.geometry.width = filled.width;
        self.geometry.height = filled.height;
        self.bytes = filled.bytes;
        self.state = BufferState::Filled;
        Ok(())
    }

    /// Returns the filled pixel bytes.
    pub fn bytes(&self) -> Result<&[u8], BufferError> {
        self.expect_state("read", BufferState::Filled)?;
        Ok(&self.bytes)
    }

    /// Releases the device-side allocation and drops any pixel data.
    ///
    /// The handle is marked revoked even if the device reports an error,
    /// so a failed release is never retried against a stale id.
    pub fn revoke<D: Device>(&mut self, device: &mut D) -> Result<(), BufferError> {
        if self.state == BufferState::Revoked {
            return Err(BufferError::InvalidState {
                operation: "revoke",
                state: self.state,
            });
        }
        self.state = BufferState::Revoked;
        self.bytes = Vec::new();
        device.revoke_frame(self.id)?;
        tracing::debug!(frame = %self.id, "revoked frame buffer");
        Ok(())
    }

    /// Device-side identifier.
    #[inline]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Geometry of the buffer; updated to the device-reported one once filled.
    #[inline]
    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Returns true until the buffer has been revoked.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state != BufferState::Revoked
    }

    fn expect_state(&self, operation: &'static str, wanted: BufferState) -> Result<(), BufferError> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(BufferError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl fmt::Debug for FrameBufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBufferHandle")
            .field("id", &self.id)
            .field("geometry", &self.geometry)
            .field("state", &self.state)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::simulated::{SimulatedTransport, SimulatorConfig};
    use crate::device::transport::Transport;

    fn open_device() -> (crate::device::SimulatedCamera, crate::device::SimulatorProbe) {
        let mut transport = SimulatedTransport::new(SimulatorConfig::small());
        let probe = transport.probe();
        transport.startup().unwrap();
        let device = transport.open_camera("sim-0").unwrap();
        (device, probe)
    }

    #[test]
    fn test_full_lifecycle() {
        let (mut device, probe) = open_device();
        let geometry = FrameGeometry::new(8, 4, 8);

        let mut frame = FrameBufferHandle::announce(&mut device, geometry).unwrap();
        assert_eq!(frame.state(), BufferState::Announced);

        device.start_capture().unwrap();
        frame.queue(&mut device).unwrap();
        device.run_command("AcquisitionStart").unwrap();
        frame
            .wait_filled(&mut device, Some(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(frame.state(), BufferState::Filled);
        assert_eq!(frame.bytes().unwrap().len(), 32);

        frame.revoke(&mut device).unwrap();
        assert!(!frame.is_live());
        assert_eq!(probe.stats().live_frames, 0);
    }

    #[test]
    fn test_double_revoke_rejected() {
        let (mut device, probe) = open_device();
        let mut frame = FrameBufferHandle::announce(&mut device, FrameGeometry::new(4, 4, 8)).unwrap();

        frame.revoke(&mut device).unwrap();
        let err = frame.revoke(&mut device).unwrap_err();

        assert!(matches!(
            err,
            BufferError::InvalidState {
                operation: "revoke",
                state: BufferState::Revoked
            }
        ));
        // The second call never reached the device.
        assert_eq!(probe.stats().double_revokes, 0);
    }

    #[test]
    fn test_use_after_revoke_rejected() {
        let (mut device, _probe) = open_device();
        let mut frame = FrameBufferHandle::announce(&mut device, FrameGeometry::new(4, 4, 8)).unwrap();
        frame.revoke(&mut device).unwrap();

        assert!(matches!(
            frame.queue(&mut device),
            Err(BufferError::InvalidState { .. })
        ));
        assert!(matches!(frame.bytes(), Err(BufferError::InvalidState { .. })));
    }

    #[test]
    fn test_wait_before_queue_rejected() {
        let (mut device, _probe) = open_device();
        let mut frame = FrameBufferHandle::announce(&mut device, FrameGeometry::new(4, 4, 8)).unwrap();

        let err = frame.wait_filled(&mut device, None).unwrap_err();
        assert_eq!(
            err,
            BufferError::InvalidState {
                operation: "wait on",
                state: BufferState::Announced
            }
        );
    }
}
