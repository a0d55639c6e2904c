//! Live hashing of one release on a bounded producer/worker pool.
//!
//! # Overview
//!
//! ```text
//!   Walker (1 producer) --sync_channel(jobs)--> N hash workers --Mutex--> map
//! ```
//!
//! The producer walks the release tree and pushes file paths into a bounded
//! channel; dropping the sender is the end-of-work signal. Workers take paths
//! from the shared receiver, stream-hash the file and insert one
//! `(relative path, digest)` record. The map lock is held only for the
//! insert, never across a hash. [`std::thread::scope`] is the join barrier:
//! the map is handed back only after every thread has returned.
//!
//! A failure anywhere is fatal for the release. The first error is kept,
//! the producer stops walking and the workers drain what is already queued
//! without hashing it. Hashes already in flight run to completion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::thread;

use super::path_utils::relative_key;
use super::{FingerprintMap, HashError, Hasher, LiveConfig, ScanError, Walker};

/// Digest source used by the workers.
///
/// [`Hasher`] is the real implementation; tests substitute one that fails
/// on chosen paths.
pub trait FileDigest: Sync {
    /// Digest of the file at `path`, as lowercase hex.
    ///
    /// # Errors
    ///
    /// Any [`HashError`] aborts the whole release.
    fn digest(&self, path: &Path) -> Result<String, HashError>;
}

impl FileDigest for Hasher {
    fn digest(&self, path: &Path) -> Result<String, HashError> {
        self.full_hash(path)
    }
}

/// Shared state of one release build.
struct BuildState<'a, H> {
    root: &'a Path,
    hasher: &'a H,
    config: &'a LiveConfig,
    entries: Mutex<HashMap<String, String>>,
    failed: AtomicBool,
    first_error: Mutex<Option<ScanError>>,
    hashed: AtomicUsize,
}

impl<H> BuildState<'_, H> {
    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn fail(&self, error: ScanError) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            log::error!("Hashing {} aborted: {}", self.root.display(), error);
            *slot = Some(error);
        }
        self.failed.store(true, Ordering::SeqCst);
    }
}

/// Hash every regular file under `root`.
///
/// # Errors
///
/// Returns the first [`ScanError`] hit by the producer or any worker:
/// unreadable root, unreadable directory, or a file that cannot be hashed.
pub fn hash_release(root: &Path, config: &LiveConfig) -> Result<FingerprintMap, ScanError> {
    hash_release_with(root, config, &Hasher::new(config.algorithm))
}

/// [`hash_release`] with an explicit digest source.
///
/// # Errors
///
/// Same as [`hash_release`].
pub fn hash_release_with<H: FileDigest>(
    root: &Path,
    config: &LiveConfig,
    hasher: &H,
) -> Result<FingerprintMap, ScanError> {
    let walker = Walker::new(root);
    walker.check_root()?;

    let jobs = config.jobs.max(1);
    log::info!(
        "Hashing release {} with {} workers ({})",
        root.display(),
        jobs,
        config.algorithm
    );

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start(&root.to_string_lossy(), 0);
    }

    let state = BuildState {
        root,
        hasher,
        config,
        entries: Mutex::new(HashMap::new()),
        failed: AtomicBool::new(false),
        first_error: Mutex::new(None),
        hashed: AtomicUsize::new(0),
    };

    let (tx, rx) = mpsc::sync_channel::<PathBuf>(jobs);
    let rx = Mutex::new(rx);

    thread::scope(|scope| {
        let state = &state;
        let rx = &rx;
        scope.spawn(move || produce(&walker, tx, state));
        for _ in 0..jobs {
            scope.spawn(move || consume(rx, state));
        }
    });

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end(&root.to_string_lossy());
    }

    let BuildState {
        entries,
        first_error,
        hashed,
        ..
    } = state;

    if let Some(error) = first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        return Err(error);
    }

    let entries = entries.into_inner().unwrap_or_else(PoisonError::into_inner);
    log::info!(
        "Hashed {} files in {}",
        hashed.into_inner(),
        root.display()
    );
    Ok(FingerprintMap::from(entries))
}

/// Producer: walk the tree and queue every regular file.
///
/// The sender is dropped on return, which closes the queue.
fn produce<H>(walker: &Walker, tx: SyncSender<PathBuf>, state: &BuildState<'_, H>) {
    for entry in walker.walk() {
        if state.is_failed() {
            log::debug!("Producer: stopping walk of {}", walker.root().display());
            return;
        }
        match entry {
            Ok(path) => {
                if tx.send(path).is_err() {
                    return;
                }
            }
            Err(e) => {
                state.fail(e);
                return;
            }
        }
    }
}

/// Worker: hash queued files until the queue is closed and empty.
fn consume<H: FileDigest>(rx: &Mutex<Receiver<PathBuf>>, state: &BuildState<'_, H>) {
    loop {
        let next = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
        let Ok(path) = next else {
            return;
        };

        if state.is_failed() {
            continue;
        }

        match state.hasher.digest(&path) {
            Ok(digest) => {
                let key = relative_key(state.root, &path);
                log::trace!("{}  {}", digest, key);
                state
                    .entries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, digest);

                let current = state.hashed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(ref callback) = state.config.progress_callback {
                    callback.on_progress(current, &path.to_string_lossy());
                }
            }
            Err(e) => state.fail(e.into()),
        }
    }
}
