//! Hardlink merging of duplicate release files.
//!
//! # Overview
//!
//! Every duplicate is replaced by a hardlink to the copy in the group's
//! newest release. Each file goes through a small state machine:
//!
//! ```text
//! Pending --same inode--> Identical
//!    |
//!    +--rename to backup--> BackedUp --link--> Linked (backup removed)
//!                              |
//!                              +--link fails--> RolledBack (backup renamed back)
//!                                                  |
//!                                                  +--rename fails--> RollbackFailed
//! ```
//!
//! No state leaves a path without either the original content or a link to
//! identical content, except `RollbackFailed`, which leaves the original
//! under the backup name and is reported for manual repair.
//!
//! # Example
//!
//! ```no_run
//! use reldedup::actions::merge::{MergeConfig, MergeEngine};
//! use reldedup::duplicates::DuplicateSet;
//! use std::path::Path;
//!
//! let engine = MergeEngine::new(MergeConfig::default().with_dry_run(true));
//! let report = engine.merge_all(Path::new("/srv/releases"), &DuplicateSet::new());
//! println!("{}", report.summary());
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::DuplicateSet;
use crate::progress::ProgressCallback;
use crate::release::Release;
use crate::scanner::hardlink::FileIdentity;
use crate::scanner::path_utils::join_key;

/// Default suffix for the temporary backup of a duplicate.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Error detail for one failed merge step.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A merge member could not be stat'ed.
    #[error("cannot stat {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The backup name is already taken.
    #[error("backup path already exists: {0}")]
    BackupExists(PathBuf),

    /// A rename failed.
    #[error("cannot rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Creating the hardlink failed.
    #[error("cannot link {link} to {original}: {source}")]
    Link {
        original: PathBuf,
        link: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Final state of one file merge.
#[derive(Debug)]
pub enum MergeOutcome {
    /// Already the same inode; nothing to do.
    Identical,
    /// Dry run: the duplicate would be linked.
    WouldLink { bytes: u64 },
    /// The duplicate now links to the canonical copy.
    Linked { bytes: u64, backup_removed: bool },
    /// The canonical copy is gone; nothing was touched.
    MissingSource(MergeError),
    /// The duplicate is gone; nothing was touched.
    MissingDuplicate(MergeError),
    /// The backup rename failed; the duplicate is untouched.
    BackupFailed(MergeError),
    /// Linking failed and the original was restored.
    RolledBack(MergeError),
    /// Linking failed and the original is stranded at `backup`.
    RollbackFailed {
        link_error: MergeError,
        rollback_error: MergeError,
        backup: PathBuf,
    },
}

impl MergeOutcome {
    /// Machine-readable status name.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Identical => "identical",
            Self::WouldLink { .. } => "would_link",
            Self::Linked { .. } => "linked",
            Self::MissingSource(_) => "missing_source",
            Self::MissingDuplicate(_) => "missing_duplicate",
            Self::BackupFailed(_) => "backup_failed",
            Self::RolledBack(_) => "rolled_back",
            Self::RollbackFailed { .. } => "rollback_failed",
        }
    }

    /// Whether the merge did not reach its goal.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(
            self,
            Self::Identical | Self::WouldLink { .. } | Self::Linked { .. }
        )
    }

    /// Bytes freed (or, in a dry run, freeable) by this merge.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        match self {
            Self::WouldLink { bytes } => *bytes,
            Self::Linked {
                bytes,
                backup_removed: true,
            } => *bytes,
            _ => 0,
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            Self::MissingSource(e)
            | Self::MissingDuplicate(e)
            | Self::BackupFailed(e)
            | Self::RolledBack(e) => Some(e.to_string()),
            Self::RollbackFailed {
                link_error,
                rollback_error,
                backup,
            } => Some(format!(
                "{link_error}; {rollback_error}; original left at {}",
                backup.display()
            )),
            Self::Linked {
                backup_removed: false,
                ..
            } => Some("backup could not be removed".to_string()),
            _ => None,
        }
    }
}

impl Serialize for MergeOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = match self {
            Self::WouldLink { bytes } | Self::Linked { bytes, .. } => Some(*bytes),
            _ => None,
        };
        let mut state = serializer.serialize_struct("MergeOutcome", 3)?;
        state.serialize_field("status", self.status())?;
        state.serialize_field("bytes", &bytes)?;
        state.serialize_field("error", &self.error_message())?;
        state.end()
    }
}

/// One merge attempt.
#[derive(Debug, Serialize)]
pub struct MergeRecord {
    /// Relative path inside the releases
    pub path: String,
    /// Release that owns the duplicate
    pub release: String,
    /// Release that holds the canonical copy
    pub canonical: String,
    /// What happened
    pub outcome: MergeOutcome,
}

/// Results of a full merge pass.
#[derive(Debug, Default, Serialize)]
pub struct MergeReport {
    /// Whether the filesystem was left untouched.
    pub dry_run: bool,
    /// Every attempt, sorted by path and release.
    pub records: Vec<MergeRecord>,
    /// Duplicates replaced by links.
    pub linked: usize,
    /// Duplicates that already were links.
    pub identical: usize,
    /// Duplicates a real run would link.
    pub would_link: usize,
    /// Attempts that did not reach their goal.
    pub failed: usize,
    /// Total bytes freed (or freeable in a dry run).
    pub bytes_reclaimed: u64,
}

impl MergeReport {
    fn from_records(dry_run: bool, mut records: Vec<MergeRecord>) -> Self {
        records.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.release.cmp(&b.release)));

        let mut report = Self {
            dry_run,
            ..Self::default()
        };
        for record in &records {
            match record.outcome {
                MergeOutcome::Identical => report.identical += 1,
                MergeOutcome::WouldLink { .. } => report.would_link += 1,
                MergeOutcome::Linked { .. } => report.linked += 1,
                _ => report.failed += 1,
            }
            report.bytes_reclaimed += record.outcome.bytes_reclaimed();
        }
        report.records = records;
        report
    }

    /// Total merge attempts.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.records.len()
    }

    /// Whether any attempt failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Records that need attention.
    pub fn failures(&self) -> impl Iterator<Item = &MergeRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    /// Human-readable summary of the pass.
    #[must_use]
    pub fn summary(&self) -> String {
        let size = bytesize::ByteSize::b(self.bytes_reclaimed);
        if self.dry_run {
            format!(
                "Dry run: would link {} file(s), {} already linked, {} failed, {} reclaimable",
                self.would_link, self.identical, self.failed, size
            )
        } else {
            format!(
                "Linked {} file(s), {} already linked, {} failed, {} reclaimed",
                self.linked, self.identical, self.failed, size
            )
        }
    }
}

/// Size and identity of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
    pub identity: Option<FileIdentity>,
}

/// Filesystem operations used by the merge engine.
pub trait MergeFs: Send + Sync {
    /// Stat `path`, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<FileStat>;
    /// Whether anything exists at `path`, without following symlinks.
    fn exists(&self, path: &Path) -> bool;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl MergeFs for StdFs {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::metadata(path)?;
        Ok(FileStat {
            len: metadata.len(),
            identity: FileIdentity::from_metadata(&metadata),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Configuration for merge operations.
#[derive(Clone)]
pub struct MergeConfig {
    /// Report what would happen without touching the filesystem.
    pub dry_run: bool,
    /// Suffix appended to a duplicate while it is being replaced.
    pub backup_suffix: String,
    /// Number of merge threads.
    pub jobs: usize,
    /// Optional progress callback, notified once per attempt.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for MergeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeConfig")
            .field("dry_run", &self.dry_run)
            .field("backup_suffix", &self.backup_suffix)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            jobs: 4,
            progress_callback: None,
        }
    }
}

impl MergeConfig {
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// One duplicate to merge into its canonical copy.
struct MergeTask<'a> {
    path: &'a str,
    canonical: &'a Release,
    duplicate: &'a Release,
}

/// Hardlink merge engine.
pub struct MergeEngine<F: MergeFs = StdFs> {
    fs: F,
    config: MergeConfig,
}

impl MergeEngine<StdFs> {
    /// Engine on the real filesystem.
    #[must_use]
    pub fn new(config: MergeConfig) -> Self {
        Self::with_fs(StdFs, config)
    }
}

impl<F: MergeFs> MergeEngine<F> {
    /// Engine on a custom filesystem.
    #[must_use]
    pub fn with_fs(fs: F, config: MergeConfig) -> Self {
        Self { fs, config }
    }

    #[must_use]
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Where `duplicate` is parked while its link is created.
    #[must_use]
    pub fn backup_path(&self, duplicate: &Path) -> PathBuf {
        let mut name = duplicate.as_os_str().to_owned();
        name.push(&self.config.backup_suffix);
        PathBuf::from(name)
    }

    /// Replace `duplicate` with a hardlink to `source`.
    ///
    /// The caller guarantees both hold identical content.
    pub fn merge_file(&self, source: &Path, duplicate: &Path) -> MergeOutcome {
        let source_stat = match self.fs.stat(source) {
            Ok(stat) => stat,
            Err(e) => {
                let error = MergeError::Stat {
                    path: source.to_path_buf(),
                    source: e,
                };
                log::warn!("Canonical copy unavailable: {}", error);
                return MergeOutcome::MissingSource(error);
            }
        };
        let duplicate_stat = match self.fs.stat(duplicate) {
            Ok(stat) => stat,
            Err(e) => {
                let error = MergeError::Stat {
                    path: duplicate.to_path_buf(),
                    source: e,
                };
                log::warn!("Duplicate unavailable: {}", error);
                return MergeOutcome::MissingDuplicate(error);
            }
        };

        if let (Some(a), Some(b)) = (source_stat.identity, duplicate_stat.identity) {
            if a == b {
                log::debug!("Already linked: {}", duplicate.display());
                return MergeOutcome::Identical;
            }
        }

        let bytes = duplicate_stat.len;
        if self.config.dry_run {
            log::debug!(
                "Would link {} -> {}",
                duplicate.display(),
                source.display()
            );
            return MergeOutcome::WouldLink { bytes };
        }

        let backup = self.backup_path(duplicate);
        if self.fs.exists(&backup) {
            let error = MergeError::BackupExists(backup);
            log::error!("Skipping {}: {}", duplicate.display(), error);
            return MergeOutcome::BackupFailed(error);
        }

        if let Err(e) = self.fs.rename(duplicate, &backup) {
            let error = MergeError::Rename {
                from: duplicate.to_path_buf(),
                to: backup,
                source: e,
            };
            log::error!("Backup failed: {}", error);
            return MergeOutcome::BackupFailed(error);
        }

        if let Err(e) = self.fs.hard_link(source, duplicate) {
            let link_error = MergeError::Link {
                original: source.to_path_buf(),
                link: duplicate.to_path_buf(),
                source: e,
            };
            log::error!("Link failed: {}", link_error);

            return match self.fs.rename(&backup, duplicate) {
                Ok(()) => {
                    log::warn!("Restored {} from backup", duplicate.display());
                    MergeOutcome::RolledBack(link_error)
                }
                Err(e) => {
                    let rollback_error = MergeError::Rename {
                        from: backup.clone(),
                        to: duplicate.to_path_buf(),
                        source: e,
                    };
                    log::error!(
                        "Rollback failed, manual repair needed: {} (original at {})",
                        rollback_error,
                        backup.display()
                    );
                    MergeOutcome::RollbackFailed {
                        link_error,
                        rollback_error,
                        backup,
                    }
                }
            };
        }

        let backup_removed = match self.fs.remove_file(&backup) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot remove backup {}: {}", backup.display(), e);
                false
            }
        };

        log::debug!("Linked {} -> {}", duplicate.display(), source.display());
        MergeOutcome::Linked {
            bytes,
            backup_removed,
        }
    }

    /// Merge every duplicate in `dups` into its group's newest release.
    ///
    /// Release directories live directly under `base_dir`. Attempts run in
    /// parallel; each touches only its own duplicate path.
    pub fn merge_all(&self, base_dir: &Path, dups: &DuplicateSet) -> MergeReport {
        let tasks: Vec<MergeTask<'_>> = dups
            .iter()
            .filter_map(|(path, members)| members.iter().max().map(|c| (path, members, c)))
            .flat_map(|(path, members, canonical)| {
                members
                    .iter()
                    .filter(move |m| *m != canonical)
                    .map(move |duplicate| MergeTask {
                        path,
                        canonical,
                        duplicate,
                    })
            })
            .collect();

        let total = tasks.len();
        log::info!(
            "Merging {} duplicates with {} threads{}",
            total,
            self.config.jobs,
            if self.config.dry_run { " (dry run)" } else { "" }
        );

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("merge", total);
        }

        let done = AtomicUsize::new(0);
        let run = |task: &MergeTask<'_>| -> MergeRecord {
            let source = join_key(&base_dir.join(task.canonical.id()), task.path);
            let duplicate = join_key(&base_dir.join(task.duplicate.id()), task.path);
            let outcome = self.merge_file(&source, &duplicate);

            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref callback) = self.config.progress_callback {
                callback.on_progress(current, &duplicate.to_string_lossy());
            }

            MergeRecord {
                path: task.path.to_string(),
                release: task.duplicate.id().to_string(),
                canonical: task.canonical.id().to_string(),
                outcome,
            }
        };

        let records: Vec<MergeRecord> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| tasks.par_iter().map(&run).collect()),
            Err(e) => {
                log::warn!("Cannot build merge pool ({}), merging sequentially", e);
                tasks.iter().map(&run).collect()
            }
        };

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("merge");
        }

        let report = MergeReport::from_records(self.config.dry_run, records);
        for record in report.failures() {
            log::debug!(
                "{} in {}: {}",
                record.outcome.status(),
                record.release,
                record.path
            );
        }
        report
    }
}
