//! Release discovery in a base directory.
//!
//! Only the immediate children of the base directory are considered. A child
//! qualifies when its name follows the release grammar and it has the shape
//! the [`DiscoveryMode`] asks for: a directory, or a manifest file ending in
//! the configured suffix. Everything else is ignored.
//!
//! The result is unordered; sort it with [`super::sort_releases`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

/// Default suffix of checksum manifest files (`7.6-GA.sums`).
pub const DEFAULT_MANIFEST_SUFFIX: &str = ".sums";

/// Release name grammar, without the major-version anchor.
const RELEASE_TAIL: &str = r"\.[0-9]+(?:\.[0-9]{1,4})?-[A-Za-z]+(?:-[0-9]+)?$";

/// What a release looks like on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Each release is a directory named after the release.
    Directories,
    /// Each release is described by a manifest file `<release><suffix>`.
    Manifests {
        /// File name suffix stripped to obtain the release id
        suffix: String,
    },
}

impl DiscoveryMode {
    /// Manifest mode with the default `.sums` suffix.
    #[must_use]
    pub fn manifests() -> Self {
        Self::Manifests {
            suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
        }
    }
}

/// Errors that abort discovery.
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// The release filter is not a major version number.
    #[error("invalid release filter '{0}': expected a major version number, 0 or *")]
    InvalidFilter(String),

    /// The base directory could not be listed.
    #[error("cannot read base directory {path}: {source}")]
    Io {
        /// Base directory
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Build the name matcher for an optional major-version filter.
///
/// `0`, `*` and the empty string mean "all majors".
fn release_pattern(major_filter: &str) -> Result<Regex, DiscoveryError> {
    let filter = major_filter.trim();
    let head = match filter {
        "" | "0" | "*" => "[0-9]+".to_string(),
        digits if digits.bytes().all(|b| b.is_ascii_digit()) => regex::escape(digits),
        other => return Err(DiscoveryError::InvalidFilter(other.to_string())),
    };
    Regex::new(&format!("^{head}{RELEASE_TAIL}"))
        .map_err(|_| DiscoveryError::InvalidFilter(filter.to_string()))
}

/// Scan `base_dir` for releases.
///
/// # Errors
///
/// Fails if the filter is malformed or the base directory cannot be read.
/// Individual entries whose type cannot be determined are skipped.
pub fn discover(
    base_dir: &Path,
    major_filter: &str,
    mode: &DiscoveryMode,
) -> Result<Vec<String>, DiscoveryError> {
    let pattern = release_pattern(major_filter)?;
    let io_err = |source| DiscoveryError::Io {
        path: base_dir.to_path_buf(),
        source,
    };

    let mut releases = Vec::new();
    for entry in fs::read_dir(base_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            log::trace!("Ignoring non UTF-8 entry: {}", entry.path().display());
            continue;
        };

        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                log::warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let candidate = match mode {
            DiscoveryMode::Directories if file_type.is_dir() => Some(name),
            DiscoveryMode::Manifests { suffix } if file_type.is_file() => {
                name.strip_suffix(suffix.as_str())
            }
            _ => None,
        };

        match candidate {
            Some(release) if pattern.is_match(release) => {
                log::debug!("Found release {}", release);
                releases.push(release.to_string());
            }
            _ => log::trace!("Ignoring entry: {}", name),
        }
    }

    Ok(releases)
}
