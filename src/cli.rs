//! Command-line interface definitions for reldedup.
//!
//! All options are flat; there are no subcommands.
//!
//! # Example
//!
//! ```bash
//! # Merge duplicates across every release under the current directory
//! reldedup
//!
//! # Only the 7.x line, eight workers, nothing written
//! reldedup -r 7 -j 8 --dry-run -d /srv/releases
//!
//! # Use pre-computed <release>.sums manifests
//! reldedup --manifests -d /srv/releases
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::scanner::HashAlgorithm;

/// Deduplicate release trees by hardlinking identical files.
///
/// Every file that is byte-identical to the same path in the newest release
/// is replaced with a hardlink to the newest copy.
#[derive(Debug, Parser)]
#[command(name = "reldedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Restrict to one major version (0 or * for all)
    #[arg(short, long = "release", value_name = "MAJOR", default_value = "0", value_parser = parse_major)]
    pub release: String,

    /// Directory holding the release trees
    #[arg(short, long = "dir", value_name = "PATH", default_value = ".")]
    pub dir: PathBuf,

    /// Number of worker threads (default: config file, else CPU count)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,

    /// Read <release><suffix> manifests instead of hashing the trees
    #[arg(short, long)]
    pub manifests: bool,

    /// Suppress per-file progress output
    #[arg(short, long)]
    pub silent: bool,

    /// Report what would be merged without touching any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Digest algorithm for live hashing
    #[arg(long, value_enum, value_name = "ALGORITHM")]
    pub algorithm: Option<HashAlgorithm>,

    /// Manifest file suffix (default: .sums)
    #[arg(long, value_name = "SUFFIX")]
    pub manifest_suffix: Option<String>,

    /// Suffix for the temporary backup of a duplicate (default: .bak)
    #[arg(long, value_name = "SUFFIX")]
    pub backup_suffix: Option<String>,

    /// Seconds to wait for each manifest before giving up (default: 30)
    #[arg(long = "timeout", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the merge report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

/// Validate a major-version filter.
///
/// Accepts digits, `*` or an empty string.
///
/// # Errors
///
/// Returns an error message for anything else.
pub fn parse_major(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.is_empty() || s == "*" || s.chars().all(|c| c.is_ascii_digit()) {
        Ok(s.to_string())
    } else {
        Err(format!("invalid major version: {s} (expected a number or *)"))
    }
}
