//! Relative path keys shared by manifests, live walks and the merge engine.
//!
//! A fingerprint key is the file's path relative to its release root,
//! slash-separated, without a leading `./` or `/`. Names are kept byte for
//! byte: `join_key` must land on the same file that produced the key, and
//! two siblings that differ only in Unicode composition are distinct files.
//!
//! # Example
//!
//! ```
//! use reldedup::scanner::path_utils::normalize_key;
//!
//! assert_eq!(normalize_key("./docs/readme.txt"), "docs/readme.txt");
//! assert_eq!(normalize_key("cafe\u{0301}.txt"), "cafe\u{0301}.txt");
//! ```

use std::path::{Component, Path, PathBuf};

/// Turn a manifest path (or any user-supplied key) into a fingerprint key.
///
/// Strips repeated leading `./` and `/`. Everything else, including
/// internal spaces and decomposed characters, is kept.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    let mut key = raw;
    loop {
        if let Some(rest) = key.strip_prefix("./") {
            key = rest;
        } else if let Some(rest) = key.strip_prefix('/') {
            key = rest;
        } else {
            break;
        }
    }
    key.to_string()
}

/// Fingerprint key of `path` relative to `root`.
///
/// Components are joined with `/` regardless of platform. A path outside
/// `root` keeps its full lossy form so the mistake stays visible in logs.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve a fingerprint key under a release root.
///
/// Only normal components are appended, so `..` in a hostile manifest can
/// never escape the release root.
#[must_use]
pub fn join_key(release_root: &Path, key: &str) -> PathBuf {
    let mut path = release_root.to_path_buf();
    for part in key.split('/') {
        match part {
            "" | "." | ".." => continue,
            part => path.push(part),
        }
    }
    path
}
