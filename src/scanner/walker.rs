//! Release tree walker.
//!
//! # Overview
//!
//! The [`Walker`] enumerates every regular file under a release root. It is
//! the producer side of the live-hashing pool and runs on a single thread;
//! [`walkdir`] keeps its own stack of open directories, so deep trees do not
//! recurse on the call stack.
//!
//! - Directories are descended, never yielded
//! - Symlinks are not followed and not yielded (releases are plain trees)
//! - Entries within a directory are visited in file-name order
//! - Any read error is yielded as a [`ScanError`]; callers treat it as fatal
//!
//! # Example
//!
//! ```no_run
//! use reldedup::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/releases/7.6-GA"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("fatal: {}", e),
//!     }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::ScanError;

/// Single-threaded walker over the regular files of one release.
#[derive(Debug, Clone)]
pub struct Walker {
    /// Release root
    root: PathBuf,
}

impl Walker {
    /// Create a walker for `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// The release root being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied` or `NotADirectory` for the root.
    pub fn check_root(&self) -> Result<(), ScanError> {
        let metadata = fs::metadata(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(ScanError::NotADirectory(self.root.clone()))
        }
    }

    /// Walk the tree, yielding absolute paths of regular files.
    ///
    /// Errors are yielded in place rather than ending the iteration; the
    /// consumer decides to stop.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_file() {
                        Some(Ok(entry.into_path()))
                    } else {
                        if !file_type.is_dir() {
                            log::debug!("Skipping non-regular file: {}", entry.path().display());
                        }
                        None
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::from_io(&path, e.into())))
                }
            })
    }
}
