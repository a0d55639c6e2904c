//! Release identifiers and their total order.
//!
//! # Overview
//!
//! Releases are named `major.minor[.patch]-STAGE[-seq]`, for example
//! `7.6-GA`, `7.6-RC-2` or `7.6.1-Snap-3`. The name is tokenized on every
//! run of non-alphanumeric characters and turned into a [`ReleaseKey`]:
//!
//! - `major`, `minor` and an optional `patch` compare as integers
//!   (a missing patch compares as `0`)
//! - the stage ranks `Alpha < Beta < Snapshot < RC < GA`
//! - inside the same non-GA stage the sequence number decides
//! - `GA` carries no sequence and is always the greatest stage
//!
//! Parsing is strict. A malformed number, a missing or unknown stage or a
//! trailing token is an error: the order decides which copy of a file
//! survives, so a guessed key would silently pick the wrong canonical file.
//!
//! # Example
//!
//! ```
//! use reldedup::release::{sort_releases, Release};
//!
//! let releases = sort_releases(["7.6-GA", "7.6-RC-1", "6.10-GA"]).unwrap();
//! let ids: Vec<&str> = releases.iter().map(Release::id).collect();
//! assert_eq!(ids, vec!["6.10-GA", "7.6-RC-1", "7.6-GA"]);
//! ```

pub mod discovery;

use std::cmp::Ordering;
use std::fmt;

pub use discovery::{discover, DiscoveryError, DiscoveryMode};

/// Longest all-digit third token still read as a patch component.
pub const MAX_PATCH_DIGITS: usize = 4;

/// Errors raised while deriving an ordering key from a release identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    /// A token that must be numeric could not be parsed.
    #[error("release '{id}': expected a number for {field}, found '{token}'")]
    InvalidNumber {
        /// The full release identifier
        id: String,
        /// Which field was being parsed (major, minor, patch, sequence)
        field: &'static str,
        /// The offending token
        token: String,
    },

    /// The identifier has no stage token.
    #[error("release '{0}': missing stage (expected Alpha, Beta, Snap, RC or GA)")]
    MissingStage(String),

    /// The stage token is not one of the known stages.
    #[error("release '{id}': unknown stage '{token}'")]
    UnknownStage {
        /// The full release identifier
        id: String,
        /// The unrecognized stage token
        token: String,
    },

    /// Tokens remain after the sequence number.
    #[error("release '{id}': unexpected trailing token '{token}'")]
    TrailingToken {
        /// The full release identifier
        id: String,
        /// The first unexpected token
        token: String,
    },
}

/// Maturity stage of a release, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Early preview.
    Alpha,
    /// Feature-complete preview.
    Beta,
    /// Periodic snapshot build (`Snap` or `Snapshot`).
    Snapshot,
    /// Release candidate.
    Rc,
    /// General availability, the final build of a version.
    Ga,
}

impl Stage {
    /// Parse a stage token, ignoring case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "alpha" => Some(Self::Alpha),
            "beta" => Some(Self::Beta),
            "snap" | "snapshot" => Some(Self::Snapshot),
            "rc" => Some(Self::Rc),
            "ga" => Some(Self::Ga),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => write!(f, "Alpha"),
            Self::Beta => write!(f, "Beta"),
            Self::Snapshot => write!(f, "Snap"),
            Self::Rc => write!(f, "RC"),
            Self::Ga => write!(f, "GA"),
        }
    }
}

/// Ordering key derived from a release identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseKey {
    /// Major version
    pub major: u64,
    /// Minor version
    pub minor: u64,
    /// Optional patch component (`7.6.1-GA`)
    pub patch: Option<u64>,
    /// Release stage
    pub stage: Stage,
    /// Sequence inside the stage (`RC-2` -> 2)
    pub seq: Option<u64>,
}

impl ReleaseKey {
    /// Derive the key from an identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`ReleaseError`] if any expected token is missing or
    /// malformed. There is no fallback value.
    pub fn parse(id: &str) -> Result<Self, ReleaseError> {
        let tokens: Vec<&str> = tokenize(id).collect();

        let number = |field: &'static str, token: Option<&&str>| -> Result<u64, ReleaseError> {
            let token = token.copied().unwrap_or_default();
            token.parse::<u64>().map_err(|_| ReleaseError::InvalidNumber {
                id: id.to_string(),
                field,
                token: token.to_string(),
            })
        };

        let major = number("major", tokens.first())?;
        let minor = number("minor", tokens.get(1))?;

        // A short all-digit third token is a patch component; anything else
        // is the stage.
        let mut idx = 2;
        let patch = match tokens.get(idx) {
            Some(tok) if is_patch(tok) => {
                idx += 1;
                Some(number("patch", Some(tok))?)
            }
            _ => None,
        };

        let stage_token = tokens
            .get(idx)
            .ok_or_else(|| ReleaseError::MissingStage(id.to_string()))?;
        let stage = Stage::from_token(stage_token).ok_or_else(|| ReleaseError::UnknownStage {
            id: id.to_string(),
            token: (*stage_token).to_string(),
        })?;
        idx += 1;

        let seq = match tokens.get(idx) {
            Some(tok) => {
                idx += 1;
                Some(number("sequence", Some(tok))?)
            }
            None => None,
        };

        if let Some(extra) = tokens.get(idx) {
            return Err(ReleaseError::TrailingToken {
                id: id.to_string(),
                token: (*extra).to_string(),
            });
        }

        Ok(Self {
            major,
            minor,
            patch,
            stage,
            seq,
        })
    }

    fn version(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch.unwrap_or(0))
    }
}

impl PartialOrd for ReleaseKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version()
            .cmp(&other.version())
            .then(self.stage.cmp(&other.stage))
            .then_with(|| {
                if self.stage == Stage::Ga {
                    Ordering::Equal
                } else {
                    self.seq.cmp(&other.seq)
                }
            })
            // Keys that differ only in how the patch was spelled (`7.6-GA`
            // vs `7.6.0-GA`) still need a stable order.
            .then(self.patch.cmp(&other.patch))
    }
}

/// A release identifier together with its parsed ordering key.
///
/// Ordering follows the key; identical keys fall back to comparing the raw
/// identifier, so equality is exactly identifier equality.
#[derive(Debug, Clone)]
pub struct Release {
    id: String,
    key: ReleaseKey,
}

impl Release {
    /// Parse a release identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`ReleaseError`] when the identifier does not follow the
    /// version grammar.
    pub fn parse(id: impl Into<String>) -> Result<Self, ReleaseError> {
        let id = id.into();
        let key = ReleaseKey::parse(&id)?;
        Ok(Self { id, key })
    }

    /// The raw identifier (also the directory or manifest stem name).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The derived ordering key.
    #[must_use]
    pub fn key(&self) -> &ReleaseKey {
        &self.key
    }

    /// Major version number.
    #[must_use]
    pub fn major(&self) -> u64 {
        self.key.major
    }
}

impl PartialEq for Release {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Release {}

impl PartialOrd for Release {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Release {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Compare two raw release identifiers.
///
/// # Errors
///
/// Fails if either identifier cannot be parsed.
pub fn compare_ids(a: &str, b: &str) -> Result<Ordering, ReleaseError> {
    Ok(Release::parse(a)?.cmp(&Release::parse(b)?))
}

/// Parse every identifier and sort ascending; the last element is canonical.
///
/// Duplicate identifiers are collapsed.
///
/// # Errors
///
/// Returns the first [`ReleaseError`] encountered. One unparsable name
/// aborts the whole sort.
pub fn sort_releases<I, S>(ids: I) -> Result<Vec<Release>, ReleaseError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut releases = ids
        .into_iter()
        .map(Release::parse)
        .collect::<Result<Vec<_>, _>>()?;
    releases.sort();
    releases.dedup();
    Ok(releases)
}

fn tokenize(id: &str) -> impl Iterator<Item = &str> {
    id.split(|c: char| !c.is_alphanumeric())
        .filter(|tok| !tok.is_empty())
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn is_patch(token: &str) -> bool {
    token.len() <= MAX_PATCH_DIGITS && is_numeric(token)
}
