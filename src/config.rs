//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config <PATH>`, else `<config dir>/reldedup/config.toml`
//! 3. `RELDEDUP_*` environment variables (e.g. `RELDEDUP_JOBS=8`)
//! 4. Command-line flags, via [`Config::apply_cli`]
//!
//! ```toml
//! jobs = 8
//! algorithm = "blake3"
//! use_manifests = false
//! manifest_suffix = ".sums"
//! backup_suffix = ".bak"
//! wait_timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::DEFAULT_BACKUP_SUFFIX;
use crate::cli::Cli;
use crate::release::discovery::DEFAULT_MANIFEST_SUFFIX;
use crate::scanner::fanout::DEFAULT_WAIT_TIMEOUT;
use crate::scanner::HashAlgorithm;

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "RELDEDUP_";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration could not be parsed or merged.
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// An explicitly requested config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker threads for hashing, manifest loading and merging.
    pub jobs: usize,
    /// Digest algorithm for live hashing.
    pub algorithm: HashAlgorithm,
    /// Read manifests instead of hashing release trees.
    pub use_manifests: bool,
    /// Manifest file suffix.
    pub manifest_suffix: String,
    /// Suffix for the temporary backup of a duplicate.
    pub backup_suffix: String,
    /// Seconds to wait for each manifest result.
    pub wait_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs: std::thread::available_parallelism().map_or(4, |n| n.get()),
            algorithm: HashAlgorithm::default(),
            use_manifests: false,
            manifest_suffix: DEFAULT_MANIFEST_SUFFIX.to_string(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist and parse. A broken file at the default
    /// location is logged and ignored.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotFound`] or [`ConfigError::Figment`] for a bad
    /// explicit file or environment, [`ConfigError::Invalid`] when a value
    /// is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                log::debug!("Loading configuration from {}", path.display());
                Self::extract(Self::figment_with_file(path))?
            }
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    log::debug!("Loading configuration from {}", path.display());
                    match Self::extract(Self::figment_with_file(&path)) {
                        Ok(config) => config,
                        Err(e) => {
                            log::warn!("Ignoring {}: {}", path.display(), e);
                            Self::extract(Self::base_figment().merge(Self::env()))?
                        }
                    }
                }
                None => Self::extract(Self::base_figment().merge(Self::env()))?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX)
    }

    fn figment_with_file(path: &Path) -> Figment {
        Self::base_figment()
            .merge(Toml::file(path))
            .merge(Self::env())
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(|e| ConfigError::from(Box::new(e)))
    }

    /// Platform-specific config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "reldedup", "reldedup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay the flags given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(jobs) = cli.jobs {
            self.jobs = jobs as usize;
        }
        if let Some(algorithm) = cli.algorithm {
            self.algorithm = algorithm;
        }
        if cli.manifests {
            self.use_manifests = true;
        }
        if let Some(ref suffix) = cli.manifest_suffix {
            self.manifest_suffix.clone_from(suffix);
        }
        if let Some(ref suffix) = cli.backup_suffix {
            self.backup_suffix.clone_from(suffix);
        }
        if let Some(secs) = cli.timeout {
            self.wait_timeout_secs = secs;
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::Invalid("jobs must be at least 1".into()));
        }
        if self.manifest_suffix.is_empty() {
            return Err(ConfigError::Invalid("manifest_suffix must not be empty".into()));
        }
        if self.backup_suffix.is_empty() {
            return Err(ConfigError::Invalid("backup_suffix must not be empty".into()));
        }
        if self.wait_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "wait_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Render as a TOML config file.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Manifest liveness timeout.
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
