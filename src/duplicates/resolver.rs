//! Canonical-versus-older duplicate resolution.
//!
//! # Overview
//!
//! The release that sorts highest is canonical. Every path in the canonical
//! map is looked up in every other release's map; a release whose digest
//! for that path equals the canonical digest joins the path's group. Work is
//! bounded by `releases x |canonical map|`, not by the total file count.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use reldedup::duplicates::resolve;
//! use reldedup::release::sort_releases;
//! use reldedup::scanner::FingerprintMap;
//!
//! let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
//! let mut maps = HashMap::new();
//! maps.insert("7.6-GA".to_string(), FingerprintMap::from_iter([("a.txt", "H1")]));
//! maps.insert("7.5-GA".to_string(), FingerprintMap::from_iter([("a.txt", "H1")]));
//!
//! let dups = resolve(&releases, &maps).unwrap();
//! assert_eq!(dups.len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::release::Release;
use crate::scanner::FingerprintMap;

/// Errors that abort resolution.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No releases were given.
    #[error("no releases to resolve")]
    NoReleases,

    /// The canonical release has no fingerprint map.
    #[error("canonical release {0} has no fingerprint map")]
    CanonicalMapMissing(String),
}

/// Relative path to the set of releases holding the canonical content.
///
/// Each group is ordered by the release comparator and includes the
/// canonical release, which is the merge target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateSet {
    groups: BTreeMap<String, BTreeSet<Release>>,
}

impl DuplicateSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `release` to the group for `path`.
    pub fn insert(&mut self, path: impl Into<String>, release: Release) {
        self.groups.entry(path.into()).or_default().insert(release);
    }

    /// Members of the group for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&BTreeSet<Release>> {
        self.groups.get(path)
    }

    /// Whether `release` holds a duplicate of the canonical `path`.
    #[must_use]
    pub fn contains(&self, path: &str, release: &str) -> bool {
        self.groups
            .get(path)
            .is_some_and(|members| members.iter().any(|r| r.id() == release))
    }

    /// Number of duplicated paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether nothing is duplicated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of merge operations: every member except each group's target.
    #[must_use]
    pub fn merge_count(&self) -> usize {
        self.groups
            .values()
            .map(|members| members.len().saturating_sub(1))
            .sum()
    }

    /// Iterate over groups in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<Release>)> {
        self.groups.iter().map(|(p, m)| (p.as_str(), m))
    }
}

impl Serialize for DuplicateSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (path, members) in &self.groups {
            let ids: Vec<&str> = members.iter().map(Release::id).collect();
            map.serialize_entry(path, &ids)?;
        }
        map.end()
    }
}

/// Compare every release's map against the canonical release's map.
///
/// `releases` need not be sorted; the canonical release is their maximum.
/// Non-canonical releases without a map are skipped with a warning.
///
/// # Errors
///
/// [`ResolveError::NoReleases`] for an empty slice and
/// [`ResolveError::CanonicalMapMissing`] when the canonical release was not
/// fingerprinted.
pub fn resolve(
    releases: &[Release],
    maps: &HashMap<String, FingerprintMap>,
) -> Result<DuplicateSet, ResolveError> {
    let canonical = releases.iter().max().ok_or(ResolveError::NoReleases)?;
    let canonical_map = maps
        .get(canonical.id())
        .ok_or_else(|| ResolveError::CanonicalMapMissing(canonical.id().to_string()))?;

    log::info!(
        "Canonical release {} ({} files)",
        canonical,
        canonical_map.len()
    );

    let mut dups = DuplicateSet::new();
    for release in releases.iter().filter(|r| *r != canonical) {
        let Some(map) = maps.get(release.id()) else {
            log::warn!("Skipping release {}: no fingerprint map", release);
            continue;
        };

        let mut matched = 0usize;
        for (path, digest) in canonical_map.iter() {
            if map.get(path) == Some(digest) {
                dups.insert(path, release.clone());
                matched += 1;
            }
        }
        log::debug!("{} shares {} files with {}", release, matched, canonical);
    }

    // Every recorded group gets the merge target as a member.
    let paths: Vec<String> = dups.groups.keys().cloned().collect();
    for path in paths {
        dups.insert(path, canonical.clone());
    }

    log::info!(
        "{} paths duplicated, {} files to merge",
        dups.len(),
        dups.merge_count()
    );
    Ok(dups)
}
