//! On-disk file identity for hardlink detection.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same inode. Two
//! paths with the same identity already share one physical copy, so the
//! merge engine treats them as done and never touches them again.
//!
//! # Platform Support
//!
//! - **Unix**: Uses (device_id, inode) pairs from file metadata
//! - **Other**: Identity is unavailable; every pair is treated as distinct
//!
//! # Example
//!
//! ```no_run
//! use reldedup::scanner::hardlink::FileIdentity;
//! use std::path::Path;
//!
//! let a = FileIdentity::of(Path::new("7.6-GA/docs/readme.txt")).unwrap();
//! let b = FileIdentity::of(Path::new("7.5-GA/docs/readme.txt")).unwrap();
//! if a.is_some() && a == b {
//!     println!("already linked");
//! }
//! ```

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Platform-specific identity of the inode behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    _phantom: (),
}

impl FileIdentity {
    /// Identity from already-fetched metadata.
    ///
    /// Returns `None` where the platform exposes no inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        // Windows needs an open handle (GetFileInformationByHandle) for this.
        None
    }

    /// Stat `path` (following symlinks) and return its identity.
    ///
    /// # Errors
    ///
    /// Propagates the stat error, e.g. `NotFound`.
    pub fn of(path: &Path) -> io::Result<Option<Self>> {
        fs::metadata(path).map(|m| Self::from_metadata(&m))
    }

    /// Check whether identity comparison is supported on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

/// Whether two paths resolve to the same inode.
///
/// Returns `Ok(false)` on platforms without identity support.
///
/// # Errors
///
/// Fails if either path cannot be stat'ed.
pub fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    let (a, b) = (FileIdentity::of(a)?, FileIdentity::of(b)?);
    Ok(matches!((a, b), (Some(x), Some(y)) if x == y))
}
