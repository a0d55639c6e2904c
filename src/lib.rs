//! reldedup - release tree deduplication
//!
//! Finds files that are byte-identical to the same path in the newest
//! release and replaces them with hardlinks to the newest copy.
//!
//! The pipeline is:
//!
//! 1. [`release::discover`] and [`release::sort_releases`]
//! 2. one [`scanner::FingerprintMap`] per release, from manifests
//!    ([`scanner::fanout`]) or live hashing ([`scanner::pool`])
//! 3. [`duplicates::resolve`] against the canonical release
//! 4. [`actions::MergeEngine::merge_all`]

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod release;
pub mod scanner;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::{MergeConfig, MergeEngine, MergeReport};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::release::{DiscoveryMode, Release};
use crate::scanner::fanout::{self, FanoutConfig};
use crate::scanner::{build_fingerprint_map, FingerprintMap, LiveConfig, Strategy};

/// Run the whole pipeline on `base_dir`.
///
/// Returns an empty report when fewer than two releases match.
///
/// # Errors
///
/// Any fatal condition: unreadable base directory, unparsable release name,
/// a release that cannot be hashed, a manifest timeout, or a canonical
/// release without a fingerprint map.
pub fn dedup(
    base_dir: &Path,
    major_filter: &str,
    config: &Config,
    dry_run: bool,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<MergeReport> {
    let mode = if config.use_manifests {
        DiscoveryMode::Manifests {
            suffix: config.manifest_suffix.clone(),
        }
    } else {
        DiscoveryMode::Directories
    };

    let ids = release::discover(base_dir, major_filter, &mode)
        .with_context(|| format!("cannot discover releases in {}", base_dir.display()))?;
    if ids.len() < 2 {
        log::info!(
            "Found {} release(s) in {}, nothing to deduplicate",
            ids.len(),
            base_dir.display()
        );
        return Ok(MergeReport {
            dry_run,
            ..MergeReport::default()
        });
    }

    let releases = release::sort_releases(ids).context("cannot order releases")?;
    log::info!(
        "Found {} releases: {}",
        releases.len(),
        releases
            .iter()
            .map(Release::id)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let maps = build_maps(base_dir, &releases, config, progress.clone())?;
    let dups = duplicates::resolve(&releases, &maps).context("cannot resolve duplicates")?;

    let mut merge_config = MergeConfig::default()
        .with_dry_run(dry_run)
        .with_backup_suffix(config.backup_suffix.clone())
        .with_jobs(config.jobs);
    if let Some(progress) = progress {
        merge_config = merge_config.with_progress_callback(progress);
    }

    Ok(MergeEngine::new(merge_config).merge_all(base_dir, &dups))
}

/// Fingerprint every release, one after another for live hashing.
fn build_maps(
    base_dir: &Path,
    releases: &[Release],
    config: &Config,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<HashMap<String, FingerprintMap>> {
    if config.use_manifests {
        let fanout_config = FanoutConfig {
            base_dir: base_dir.to_path_buf(),
            suffix: config.manifest_suffix.clone(),
            jobs: config.jobs,
            timeout: config.wait_timeout(),
            progress_callback: progress,
        };
        return fanout::load_manifests(releases, &fanout_config)
            .context("cannot load release manifests");
    }

    let mut live = LiveConfig::default()
        .with_jobs(config.jobs)
        .with_algorithm(config.algorithm);
    if let Some(progress) = progress {
        live = live.with_progress_callback(progress);
    }
    let strategy = Strategy::Live(live);

    let mut maps = HashMap::with_capacity(releases.len());
    for release in releases {
        let root = base_dir.join(release.id());
        let map = build_fingerprint_map(&root, &strategy)
            .with_context(|| format!("cannot fingerprint release {release}"))?;
        maps.insert(release.id().to_string(), map);
    }
    Ok(maps)
}

/// Run the CLI application.
///
/// # Errors
///
/// Returns the first fatal error; `main` reports it and exits non-zero.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref()).context("cannot load configuration")?;
    config.apply_cli(&cli);
    config.validate().context("invalid command-line options")?;
    match config.to_toml() {
        Ok(text) => log::debug!("Effective configuration:\n{}", text.trim_end()),
        Err(e) => log::debug!("Effective configuration: {:?} ({})", config, e),
    }

    let progress: Arc<dyn ProgressCallback> =
        Arc::new(Progress::new(cli.silent || cli.quiet || cli.json));

    let report = dedup(&cli.dir, &cli.release, &config, cli.dry_run, Some(progress))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("cannot serialize report")?;
        println!("{json}");
    } else if report.total_count() > 0 {
        log::info!("{}", report.summary());
    }

    if report.has_failures() {
        log::warn!(
            "{} merge(s) need attention; see the messages above",
            report.failed
        );
    }

    Ok(ExitCode::Success)
}
