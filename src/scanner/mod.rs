//! Fingerprint map construction.
//!
//! This module turns one release into a [`FingerprintMap`] (relative path to
//! content digest) using one of two strategies:
//!
//! - [`Strategy::Manifest`]: parse a precomputed checksum manifest
//!   (see [`manifest`])
//! - [`Strategy::Live`]: walk the release tree and hash every regular file on
//!   a bounded worker pool (see [`walker`] and [`pool`])
//!
//! Several manifests can be parsed concurrently with [`fanout`].
//!
//! # Architecture
//!
//! - [`walker`]: single-threaded producer walk yielding regular files
//! - [`hasher`]: streaming SHA-256 / BLAKE3 digests
//! - [`pool`]: producer plus N hashing workers per release
//! - [`manifest`]: manifest line parsing
//! - [`fanout`]: cross-release manifest pool with a liveness timeout
//! - [`hardlink`]: inode identity used by the merge engine
//! - [`path_utils`]: relative key normalization
//!
//! # Example
//!
//! ```no_run
//! use reldedup::scanner::{build_fingerprint_map, LiveConfig, Strategy};
//! use std::path::Path;
//!
//! let map = build_fingerprint_map(
//!     Path::new("/srv/releases/7.6-GA"),
//!     &Strategy::Live(LiveConfig::default()),
//! )
//! .unwrap();
//! println!("{} files fingerprinted", map.len());
//! ```

pub mod fanout;
pub mod hardlink;
pub mod hasher;
pub mod manifest;
pub mod path_utils;
pub mod pool;
pub mod walker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::progress::ProgressCallback;

// Re-export main types
pub use hasher::{hash_to_hex, HashAlgorithm, Hasher};
pub use walker::Walker;

/// Mapping from relative file path to content digest for one release.
///
/// Built once per release and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintMap {
    entries: HashMap<String, String>,
}

impl FingerprintMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a `(path, digest)` record, returning the previous digest.
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) -> Option<String> {
        self.entries.insert(path.into(), digest.into())
    }

    /// Digest recorded for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Number of fingerprinted files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(path, digest)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), d.as_str()))
    }
}

impl From<HashMap<String, String>> for FingerprintMap {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

impl<P: Into<String>, D: Into<String>> FromIterator<(P, D)> for FingerprintMap {
    fn from_iter<I: IntoIterator<Item = (P, D)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(p, d)| (p.into(), d.into()))
                .collect(),
        }
    }
}

/// Settings for the live-hashing strategy.
#[derive(Clone)]
pub struct LiveConfig {
    /// Number of hashing worker threads.
    pub jobs: usize,
    /// Digest algorithm.
    pub algorithm: HashAlgorithm,
    /// Optional progress callback, notified once per hashed file.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("jobs", &self.jobs)
            .field("algorithm", &self.algorithm)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            jobs: 4,
            algorithm: HashAlgorithm::default(),
            progress_callback: None,
        }
    }
}

impl LiveConfig {
    /// Set the worker count (at least one).
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Set the digest algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// How a release's fingerprint map is obtained.
#[derive(Debug, Clone)]
pub enum Strategy {
    /// The source path is a manifest file.
    Manifest,
    /// The source path is a release root to walk and hash.
    Live(LiveConfig),
}

/// Build the fingerprint map of one release.
///
/// `source` is the manifest file for [`Strategy::Manifest`] and the release
/// root directory for [`Strategy::Live`].
///
/// # Errors
///
/// Any [`ScanError`] is fatal for this release: an unreadable manifest or
/// release root, or a file the live walk found but could not hash.
/// Malformed manifest lines are not errors; they are skipped with a warning.
pub fn build_fingerprint_map(source: &Path, strategy: &Strategy) -> Result<FingerprintMap, ScanError> {
    match strategy {
        Strategy::Manifest => manifest::read_manifest(source),
        Strategy::Live(config) => pool::hash_release(source, config),
    }
}

/// Errors that can occur while building a fingerprint map.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The release root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A discovered file could not be hashed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// An I/O error occurred while accessing a file or directory.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
