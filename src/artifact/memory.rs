//! In-memory artifact sink.

use super::sink::{artifact_id, Artifact, ArtifactHandle, ArtifactSink, SinkError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Keeps every stored artifact in memory.
///
/// Clones share storage, so a clone kept by the caller sees frames stored
/// through the camera.
#[derive(Debug, Clone)]
pub struct MemorySink {
    prefix: String,
    stored: Arc<Mutex<Vec<(ArtifactHandle, Artifact)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_prefix("frame")
    }

    /// Uses `prefix` for artifact ids.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stored: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ArtifactHandle, Artifact)>> {
        // A panic while pushing cannot leave the vector half-written.
        self.stored.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up an artifact by handle.
    pub fn get(&self, handle: &ArtifactHandle) -> Option<Artifact> {
        self.lock()
            .iter()
            .find(|(stored, _)| stored.id() == handle.id())
            .map(|(_, artifact)| artifact.clone())
    }

    /// Most recently stored artifact.
    pub fn latest(&self) -> Option<Artifact> {
        self.lock().last().map(|(_, artifact)| artifact.clone())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSink for MemorySink {
    fn store(&mut self, artifact: Artifact) -> Result<ArtifactHandle, SinkError> {
        let mut stored = self.lock();
        let id = artifact_id(
            &self.prefix,
            artifact.metadata.frame_start_time(),
            stored.len() as u64,
        );
        let handle = ArtifactHandle::new(id);
        stored.push((handle.clone(), artifact));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Binning;
    use crate::exposure::CaptureMetadata;
    use crate::readout::{PixelGrid, PixelStatistics};
    use chrono::Utc;

    fn artifact(value: u8) -> Artifact {
        let pixels = PixelGrid::new(vec![value; 6], 3, 2).unwrap();
        Artifact {
            statistics: PixelStatistics::analyze(&pixels),
            pixels,
            metadata: CaptureMetadata::new(Utc::now(), 31.0, 1),
            exposure_time: 0.5,
            binning: Binning::FULL,
        }
    }

    #[test]
    fn test_store_and_get() {
        let mut sink = MemorySink::new();
        let observer = sink.clone();

        let first = sink.store(artifact(1)).unwrap();
        let second = sink.store(artifact(2)).unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(observer.len(), 2);
        assert_eq!(observer.get(&first).unwrap().pixels.pixels(), &[1; 6]);
        assert_eq!(observer.latest().unwrap().pixels.pixels(), &[2; 6]);
        assert!(first.location().is_none());
    }

    #[test]
    fn test_unknown_handle() {
        let sink = MemorySink::new();
        assert!(sink.get(&ArtifactHandle::new("missing")).is_none());
        assert!(sink.is_empty());
    }
}
