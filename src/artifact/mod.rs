//! Artifact sinks.
//!
//! A completed cycle hands its frame, metadata and statistics to an
//! [`ArtifactSink`]. Two sinks are provided:
//!
//! - [`MemorySink`] keeps frames in memory for tests and embedding
//! - [`DirectorySink`] writes an image file plus a TOML sidecar

mod checksum;
mod directory;
mod memory;
mod sink;

pub use checksum::{Checksum, ChecksumAlgorithm, ImageFileFormat};
pub use directory::{ArtifactRecord, DirectorySink};
pub use memory::MemorySink;
pub use sink::{artifact_id, Artifact, ArtifactHandle, ArtifactSink, SinkError};
