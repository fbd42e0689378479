//! Directory-backed artifact sink.
//!
//! Each frame is written as an 8-bit grayscale image next to a TOML
//! sidecar holding the capture metadata, pixel statistics and the image
//! checksum. Existing files are never overwritten.

use super::checksum::{Checksum, ChecksumAlgorithm, ImageFileFormat};
use super::sink::{artifact_id, Artifact, ArtifactHandle, ArtifactSink, SinkError};
use crate::capabilities::Binning;
use crate::exposure::CaptureMetadata;
use crate::instrument::OutputConfig;
use crate::readout::PixelStatistics;
use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of the sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    /// Image file name, relative to the sidecar.
    pub image: String,
    pub format: ImageFileFormat,
    pub width: u32,
    pub height: u32,
    /// Exposure time in seconds.
    pub exposure_time: f64,
    pub binning: Binning,
    pub checksum: Checksum,
    pub metadata: CaptureMetadata,
    pub statistics: PixelStatistics,
}

impl ArtifactRecord {
    /// Reads a sidecar file.
    pub fn read(path: &Path) -> Result<Self, SinkError> {
        let contents = fs::read_to_string(path).map_err(|e| SinkError::io(path, e))?;
        toml::from_str(&contents).map_err(|e| SinkError::Metadata(e.to_string()))
    }
}

/// Writes artifacts into a directory.
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    format: ImageFileFormat,
    checksum: ChecksumAlgorithm,
    prefix: String,
    sequence: u64,
}

impl DirectorySink {
    /// Creates a sink writing PNG files with BLAKE3 checksums.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            format: ImageFileFormat::default(),
            checksum: ChecksumAlgorithm::default(),
            prefix: "frame".to_string(),
            sequence: 0,
        }
    }

    /// Creates a sink from the output section of the configuration.
    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(config.directory.clone())
            .with_format(config.format)
            .with_checksum(config.checksum)
            .with_prefix(config.prefix.clone())
    }

    pub fn with_format(mut self, format: ImageFileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumAlgorithm) -> Self {
        self.checksum = checksum;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn encode(&self, artifact: &Artifact) -> Result<Vec<u8>, SinkError> {
        let grid = &artifact.pixels;
        let mut encoded = Vec::new();
        let result = match self.format {
            ImageFileFormat::Png => PngEncoder::new(&mut encoded).write_image(
                grid.pixels(),
                grid.width(),
                grid.height(),
                ExtendedColorType::L8,
            ),
            ImageFileFormat::Pgm => PnmEncoder::new(&mut encoded)
                .with_subtype(PnmSubtype::Graymap(SampleEncoding::Binary))
                .write_image(
                    grid.pixels(),
                    grid.width(),
                    grid.height(),
                    ExtendedColorType::L8,
                ),
        };
        result.map_err(|e| SinkError::Encode(e.to_string()))?;
        Ok(encoded)
    }
}

fn write_new(path: &Path, contents: &[u8]) -> Result<(), SinkError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| SinkError::io(path, e))?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| SinkError::io(path, e))
}

impl ArtifactSink for DirectorySink {
    fn store(&mut self, artifact: Artifact) -> Result<ArtifactHandle, SinkError> {
        fs::create_dir_all(&self.directory).map_err(|e| SinkError::io(&self.directory, e))?;

        let id = artifact_id(
            &self.prefix,
            artifact.metadata.frame_start_time(),
            self.sequence,
        );
        let image_name = format!("{}.{}", id, self.format.extension());
        let image_path = self.directory.join(&image_name);
        let sidecar_path = self.directory.join(format!("{id}.toml"));

        let encoded = self.encode(&artifact)?;
        let checksum = self.checksum.digest(&encoded);

        let record = ArtifactRecord {
            id: id.clone(),
            image: image_name,
            format: self.format,
            width: artifact.pixels.width(),
            height: artifact.pixels.height(),
            exposure_time: artifact.exposure_time,
            binning: artifact.binning,
            checksum: checksum.clone(),
            metadata: artifact.metadata,
            statistics: artifact.statistics,
        };
        let sidecar =
            toml::to_string_pretty(&record).map_err(|e| SinkError::Metadata(e.to_string()))?;

        write_new(&image_path, &encoded)?;
        if let Err(e) = write_new(&sidecar_path, sidecar.as_bytes()) {
            // An image without its sidecar is not a stored artifact.
            if let Err(cleanup) = fs::remove_file(&image_path) {
                warn!(path = %image_path.display(), error = %cleanup, "failed to remove orphaned image");
            }
            return Err(e);
        }
        self.sequence += 1;

        debug!(id = %id, path = %image_path.display(), checksum = %checksum, "artifact written");

        Ok(ArtifactHandle::new(id)
            .with_location(image_path)
            .with_checksum(checksum))
    }
}
