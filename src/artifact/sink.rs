//! Artifact sink interface.

use super::checksum::Checksum;
use crate::capabilities::Binning;
use crate::exposure::CaptureMetadata;
use crate::readout::{PixelGrid, PixelStatistics};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A captured frame with everything recorded about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub pixels: PixelGrid,
    pub metadata: CaptureMetadata,
    pub statistics: PixelStatistics,
    /// Exposure time in seconds.
    pub exposure_time: f64,
    pub binning: Binning,
}

/// Reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    id: String,
    location: Option<PathBuf>,
    checksum: Option<Checksum>,
}

impl ArtifactHandle {
    /// Handle for an artifact that lives only in memory.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: None,
            checksum: None,
        }
    }

    /// Records where the image was written.
    pub fn with_location(mut self, location: PathBuf) -> Self {
        self.location = Some(location);
        self
    }

    /// Records the image checksum.
    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Unique artifact identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Image path, for sinks that write files.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }
}

/// Errors raised while storing an artifact.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SinkError {
    #[error("I/O error writing {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("failed to encode image: {0}")]
    Encode(String),
    #[error("failed to serialize metadata: {0}")]
    Metadata(String),
    #[error("artifact rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        SinkError::Io {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

/// Destination for completed frames.
///
/// Called exactly once per successful cycle, from the thread running it.
pub trait ArtifactSink: Send {
    /// Stores `artifact`, returning a handle to it.
    fn store(&mut self, artifact: Artifact) -> Result<ArtifactHandle, SinkError>;
}

impl<S: ArtifactSink + ?Sized> ArtifactSink for Box<S> {
    fn store(&mut self, artifact: Artifact) -> Result<ArtifactHandle, SinkError> {
        (**self).store(artifact)
    }
}

/// Builds `<prefix>-<UTC start time>-<sequence>`.
pub fn artifact_id(prefix: &str, start: DateTime<Utc>, sequence: u64) -> String {
    format!(
        "{}-{}-{:04}",
        prefix,
        start.format("%Y%m%dT%H%M%S%.3fZ"),
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_id_format() {
        let start = Utc.with_ymd_and_hms(2024, 3, 9, 21, 4, 5).unwrap();
        assert_eq!(
            artifact_id("frame", start, 7),
            "frame-20240309T210405.000Z-0007"
        );
    }

    #[test]
    fn test_handle_builders() {
        let handle = ArtifactHandle::new("a").with_location(PathBuf::from("/tmp/a.png"));
        assert_eq!(handle.id(), "a");
        assert_eq!(handle.location(), Some(Path::new("/tmp/a.png")));
        assert!(handle.checksum().is_none());
    }
}
