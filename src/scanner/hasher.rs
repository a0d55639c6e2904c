//! Streaming content hasher.
//!
//! # Overview
//!
//! Files are read through a fixed-size buffer and fed to the digest, so the
//! memory cost of hashing does not depend on file size. The digest is
//! rendered as lowercase hex so live-hashed maps compare directly against
//! manifests produced by `sha256sum`.
//!
//! # Example
//!
//! ```no_run
//! use reldedup::scanner::hasher::{HashAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(HashAlgorithm::Sha256);
//! let digest = hasher.full_hash(Path::new("docs/readme.txt")).unwrap();
//! assert_eq!(digest.len(), 64);
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::HashError;

/// Read buffer size for streaming hashes (64 KiB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithm used for live hashing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, the format written by `sha256sum`
    #[default]
    Sha256,
    /// BLAKE3, faster but incompatible with `sha256sum` manifests
    Blake3,
}

impl HashAlgorithm {
    /// Length of the hex digest produced by this algorithm.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 64,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Render raw digest bytes as lowercase hex.
#[must_use]
pub fn hash_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// File hasher bound to one algorithm.
///
/// `Hasher` holds no per-file state; one instance is shared by all workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher {
    algorithm: HashAlgorithm,
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The algorithm this hasher uses.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash the full contents of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<String, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.hash_reader(file)
            .map_err(|e| HashError::from_io(path, e))
    }

    /// Hash everything a reader yields.
    ///
    /// # Errors
    ///
    /// Propagates read errors.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<String> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let mut digest = Sha256::new();
                stream(&mut reader, &mut buffer, |chunk| digest.update(chunk))?;
                Ok(hash_to_hex(&digest.finalize()))
            }
            HashAlgorithm::Blake3 => {
                let mut digest = blake3::Hasher::new();
                stream(&mut reader, &mut buffer, |chunk| {
                    digest.update(chunk);
                })?;
                Ok(digest.finalize().to_hex().to_string())
            }
        }
    }
}

fn stream<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    mut sink: impl FnMut(&[u8]),
) -> io::Result<()> {
    loop {
        match reader.read(buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => sink(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
