//! File actions module.
//!
//! Duplicates are merged by replacing each older copy with a hardlink to
//! the copy in the newest release. See [`merge`] for the per-file state
//! machine and its rollback guarantees.
//!
//! ```no_run
//! use reldedup::actions::{MergeConfig, MergeEngine};
//! use std::path::Path;
//!
//! let engine = MergeEngine::new(MergeConfig::default());
//! let outcome = engine.merge_file(
//!     Path::new("7.6-GA/docs/readme.txt"),
//!     Path::new("7.5-GA/docs/readme.txt"),
//! );
//! println!("{}", outcome.status());
//! ```

pub mod merge;

pub use merge::{
    FileStat, MergeConfig, MergeEngine, MergeError, MergeFs, MergeOutcome, MergeRecord,
    MergeReport, StdFs, DEFAULT_BACKUP_SUFFIX,
};
