//! Concurrent manifest loading across releases.
//!
//! A fixed pool of worker threads takes release ids from a shared queue,
//! parses `<base>/<release><suffix>` and sends the result back on a channel.
//! The caller waits for each result with a liveness timeout. A stuck read on
//! a hung filesystem has no safe automatic recovery, so running out of time
//! is fatal rather than retried.
//!
//! Workers are detached threads, not scoped ones: when the timeout fires the
//! caller must be able to return while a worker is still blocked in I/O.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use super::{manifest, FingerprintMap, ScanError};
use crate::progress::ProgressCallback;
use crate::release::Release;

/// Default liveness timeout for each manifest result.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for [`load_manifests`].
#[derive(Clone)]
pub struct FanoutConfig {
    /// Directory holding the manifests.
    pub base_dir: PathBuf,
    /// Manifest file suffix.
    pub suffix: String,
    /// Worker pool size (capped at the number of releases).
    pub jobs: usize,
    /// Maximum wait for each result.
    pub timeout: Duration,
    /// Optional progress callback, notified once per loaded manifest.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FanoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutConfig")
            .field("base_dir", &self.base_dir)
            .field("suffix", &self.suffix)
            .field("jobs", &self.jobs)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FanoutConfig {
    /// Configuration with default suffix, four workers and a 30 s timeout.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            suffix: crate::release::discovery::DEFAULT_MANIFEST_SUFFIX.to_string(),
            jobs: 4,
            timeout: DEFAULT_WAIT_TIMEOUT,
            progress_callback: None,
        }
    }

    /// Path of the manifest for `release`.
    #[must_use]
    pub fn manifest_path(&self, release: &str) -> PathBuf {
        self.base_dir.join(format!("{release}{}", self.suffix))
    }
}

/// Errors that abort the fan-out.
#[derive(thiserror::Error, Debug)]
pub enum FanoutError {
    /// No result arrived within the liveness timeout.
    #[error("waited more than {}s for a manifest result ({pending} of {total} still pending)", .timeout.as_secs())]
    Timeout {
        /// The configured timeout
        timeout: Duration,
        /// Results not yet received
        pending: usize,
        /// Total expected results
        total: usize,
    },

    /// Every worker exited before all results were delivered.
    #[error("manifest workers exited with {pending} results outstanding")]
    WorkersLost {
        /// Results not yet received
        pending: usize,
    },

    /// A worker thread could not be started.
    #[error("cannot spawn manifest worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Load the manifests of `releases` on a worker pool.
///
/// A manifest that cannot be read is reported and left out of the result;
/// the resolver decides whether a missing map matters.
///
/// # Errors
///
/// [`FanoutError::Timeout`] if any single wait exceeds `config.timeout`,
/// [`FanoutError::WorkersLost`] if the workers die early, or
/// [`FanoutError::Spawn`] if the pool cannot be created.
pub fn load_manifests(
    releases: &[Release],
    config: &FanoutConfig,
) -> Result<HashMap<String, FingerprintMap>, FanoutError> {
    let total = releases.len();
    let mut maps = HashMap::with_capacity(total);
    if total == 0 {
        return Ok(maps);
    }

    let (queue_tx, queue_rx) = mpsc::channel::<String>();
    for release in releases {
        // The receiver is alive in this scope, so send cannot fail.
        let _ = queue_tx.send(release.id().to_string());
    }
    drop(queue_tx);
    let queue_rx = Arc::new(Mutex::new(queue_rx));

    let (result_tx, result_rx) = mpsc::channel::<(String, Result<FingerprintMap, ScanError>)>();
    let workers = config.jobs.clamp(1, total);
    log::info!("Loading {} manifests with {} workers", total, workers);

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_start("manifests", total);
    }

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let queue_rx = Arc::clone(&queue_rx);
        let result_tx = result_tx.clone();
        let config = config.clone();
        let handle = thread::Builder::new()
            .name(format!("manifest-{i}"))
            .spawn(move || loop {
                let next = queue_rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
                let Ok(release) = next else {
                    return;
                };
                let path = config.manifest_path(&release);
                log::debug!("Parsing {}", path.display());
                let result = manifest::read_manifest(&path);
                if result_tx.send((release, result)).is_err() {
                    return;
                }
            })
            .map_err(FanoutError::Spawn)?;
        handles.push(handle);
    }
    drop(result_tx);

    for received in 0..total {
        match result_rx.recv_timeout(config.timeout) {
            Ok((release, Ok(map))) => {
                log::debug!("Mapped {} ({} entries)", release, map.len());
                maps.insert(release, map);
            }
            Ok((release, Err(e))) => {
                log::warn!("No fingerprint map for release {}: {}", release, e);
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    "Waiting for manifest longer than {} seconds",
                    config.timeout.as_secs()
                );
                return Err(FanoutError::Timeout {
                    timeout: config.timeout,
                    pending: total - received,
                    total,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(FanoutError::WorkersLost {
                    pending: total - received,
                });
            }
        }
        if let Some(ref callback) = config.progress_callback {
            callback.on_progress(received + 1, "manifest");
        }
    }

    // Every result is in and the queue is empty, so the workers are exiting.
    for handle in handles {
        if handle.join().is_err() {
            log::warn!("A manifest worker panicked after delivering its results");
        }
    }

    if let Some(ref callback) = config.progress_callback {
        callback.on_phase_end("manifests");
    }

    Ok(maps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::sort_releases;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, release: &str, body: &str) {
        fs::write(dir.path().join(format!("{release}.sums")), body).unwrap();
    }

    #[test]
    fn test_load_all_manifests() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "7.5-GA", "h1  ./a.txt\nh2  ./b.txt\n");
        write_manifest(&dir, "7.6-GA", "h1  ./a.txt\nh3  ./b.txt\n");
        write_manifest(&dir, "6.10-GA", "h1  ./a.txt\n");

        let releases = sort_releases(["7.5-GA", "7.6-GA", "6.10-GA"]).unwrap();
        let maps = load_manifests(&releases, &FanoutConfig::new(dir.path())).unwrap();

        assert_eq!(maps.len(), 3);
        assert_eq!(maps["7.6-GA"].get("b.txt"), Some("h3"));
        assert_eq!(maps["6.10-GA"].len(), 1);
    }

    #[test]
    fn test_unreadable_manifest_is_left_out() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "7.6-GA", "h1  ./a.txt\n");

        let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
        let maps = load_manifests(&releases, &FanoutConfig::new(dir.path())).unwrap();

        assert_eq!(maps.len(), 1);
        assert!(maps.contains_key("7.6-GA"));
    }

    #[test]
    fn test_more_workers_than_releases() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "7.5-GA", "h1  a\n");
        write_manifest(&dir, "7.6-GA", "h1  a\n");

        let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
        let mut config = FanoutConfig::new(dir.path());
        config.jobs = 64;
        let maps = load_manifests(&releases, &config).unwrap();
        assert_eq!(maps.len(), 2);
    }

    #[test]
    fn test_custom_suffix() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("7.6-GA.sha256"), "h1  a\n").unwrap();

        let releases = sort_releases(["7.6-GA"]).unwrap();
        let mut config = FanoutConfig::new(dir.path());
        config.suffix = ".sha256".to_string();
        let maps = load_manifests(&releases, &config).unwrap();
        assert_eq!(maps["7.6-GA"].get("a"), Some("h1"));
    }

    #[test]
    #[cfg(unix)]
    fn test_hung_manifest_times_out() {
        // Opening a FIFO for reading blocks until a writer appears.
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("7.6-GA.sums");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !matches!(status, Ok(s) if s.success()) {
            eprintln!("Skipping timeout test: mkfifo unavailable");
            return;
        }

        let releases = sort_releases(["7.6-GA"]).unwrap();
        let mut config = FanoutConfig::new(dir.path());
        config.timeout = Duration::from_millis(200);

        let err = load_manifests(&releases, &config).unwrap_err();
        assert!(matches!(
            err,
            FanoutError::Timeout {
                pending: 1,
                total: 1,
                ..
            }
        ));

        // Release the blocked worker so the thread can exit.
        let _ = fs::OpenOptions::new().write(true).open(&fifo);
    }

    #[test]
    fn test_empty_release_list() {
        let dir = TempDir::new().unwrap();
        let maps = load_manifests(&[], &FanoutConfig::new(dir.path())).unwrap();
        assert!(maps.is_empty());
    }
}
