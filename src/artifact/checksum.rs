//! Artifact checksums and on-disk image formats.

use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest recorded for each stored image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// BLAKE3, the default.
    #[default]
    Blake3,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Short name as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Blake3 => "blake3",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Digests `data`.
    pub fn digest(&self, data: &[u8]) -> Checksum {
        let bytes: [u8; 32] = match self {
            ChecksumAlgorithm::Blake3 => {
                let mut hasher = Blake3Hasher::new();
                hasher.update(data);
                *hasher.finalize().as_bytes()
            }
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                hasher.finalize().into()
            }
        };

        Checksum {
            algorithm: *self,
            digest: bytes.iter().map(|b| format!("{:02x}", b)).collect(),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(format!("unknown checksum algorithm '{other}'")),
        }
    }
}

/// Hex digest of an image file's contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex, 64 characters.
    pub digest: String,
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

/// Image container written by the directory sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFileFormat {
    /// Lossless PNG, 8-bit grayscale.
    #[default]
    Png,
    /// Binary portable graymap.
    Pgm,
}

impl ImageFileFormat {
    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileFormat::Png => "png",
            ImageFileFormat::Pgm => "pgm",
        }
    }
}

impl fmt::Display for ImageFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFileFormat::Png),
            "pgm" | "pnm" => Ok(ImageFileFormat::Pgm),
            other => Err(format!("unknown image format '{other}'")),
        }
    }
}
