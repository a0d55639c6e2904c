//! Checksum manifest parsing.
//!
//! A manifest lists one file per line as `<digest><whitespace><path>`, the
//! format written by `sha256sum` run from inside the release root:
//!
//! ```text
//! 5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03  ./docs/readme.txt
//! ```
//!
//! Parsing is lenient per line and strict per file: a line that does not
//! split into a digest and a path is skipped with a warning, but a manifest
//! that cannot be read at all is an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::path_utils::normalize_key;
use super::{FingerprintMap, ScanError};

/// Classification of one manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    /// A `(path, digest)` record.
    Entry {
        /// Normalized relative path
        path: String,
        /// Lowercase digest
        digest: String,
    },
    /// A `#` comment.
    Comment,
    /// Fewer than two fields.
    Malformed,
}

/// Parse one manifest line.
///
/// The path is everything after the first run of whitespace, so paths may
/// contain spaces. A `*` binary-mode marker directly after a single-space
/// separator is dropped, as is a leading `./`.
#[must_use]
pub fn parse_line(line: &str) -> ManifestLine {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    if line.starts_with('#') {
        return ManifestLine::Comment;
    }

    let Some(split) = line.find(char::is_whitespace) else {
        return ManifestLine::Malformed;
    };
    let (digest, rest) = line.split_at(split);
    let path = rest.trim_start();
    let separator_len = rest.len() - path.len();

    let path = match path.strip_prefix('*') {
        Some(stripped) if separator_len == 1 => stripped,
        _ => path,
    };
    let path = path.trim_end();

    if path.is_empty() {
        return ManifestLine::Malformed;
    }

    ManifestLine::Entry {
        path: normalize_key(path),
        digest: digest.to_ascii_lowercase(),
    }
}

/// Parse a whole manifest from a reader.
///
/// `origin` names the manifest in log messages.
///
/// # Errors
///
/// Propagates read errors. Malformed lines are not errors.
pub fn parse_manifest<R: BufRead>(mut reader: R, origin: &str) -> std::io::Result<FingerprintMap> {
    let mut map = FingerprintMap::new();
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = String::from_utf8_lossy(&buf);

        match parse_line(&line) {
            ManifestLine::Entry { path, digest } => {
                log::trace!("Mapped {}", path);
                if let Some(previous) = map.insert(path.clone(), digest) {
                    log::warn!(
                        "{}:{}: duplicate entry for {} (replacing {})",
                        origin,
                        line_no,
                        path,
                        previous
                    );
                }
            }
            ManifestLine::Comment => log::debug!("{}:{}: comment skipped", origin, line_no),
            ManifestLine::Malformed => {
                log::warn!(
                    "{}:{}: cannot parse line: {:?}",
                    origin,
                    line_no,
                    line.trim_end()
                );
            }
        }
    }

    Ok(map)
}

/// Read and parse a manifest file.
///
/// # Errors
///
/// Returns [`ScanError`] if the manifest cannot be opened or read.
pub fn read_manifest(path: &Path) -> Result<FingerprintMap, ScanError> {
    let file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
    let map = parse_manifest(BufReader::new(file), &path.display().to_string())
        .map_err(|e| ScanError::from_io(path, e))?;
    log::info!("Read {} entries from {}", map.len(), path.display());
    Ok(map)
}
