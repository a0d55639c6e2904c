use reldedup::release::{discover, sort_releases, DiscoveryError, DiscoveryMode, Release};
use std::fs;
use tempfile::tempdir;

fn ids(releases: &[Release]) -> Vec<&str> {
    releases.iter().map(Release::id).collect()
}

#[test]
fn test_discover_and_sort_directories() {
    let dir = tempdir().unwrap();
    for name in [
        "7.6-GA",
        "7.5-GA",
        "6.10-GA",
        "7.6-RC-2",
        "7.6-RC-10",
        "7.6.1-GA",
        "notes",
        "7.6-GA.sums",
    ] {
        fs::create_dir(dir.path().join(name)).unwrap();
    }
    fs::write(dir.path().join("7.7-GA"), b"a file, not a release").unwrap();

    let found = discover(dir.path(), "0", &DiscoveryMode::Directories).unwrap();
    let releases = sort_releases(found).unwrap();

    assert_eq!(
        ids(&releases),
        vec!["6.10-GA", "7.5-GA", "7.6-RC-2", "7.6-RC-10", "7.6-GA", "7.6.1-GA"]
    );
}

#[test]
fn test_major_filter() {
    let dir = tempdir().unwrap();
    for name in ["6.10-GA", "7.5-GA", "7.6-GA", "17.0-GA"] {
        fs::create_dir(dir.path().join(name)).unwrap();
    }

    let mut found = discover(dir.path(), "7", &DiscoveryMode::Directories).unwrap();
    found.sort();
    assert_eq!(found, vec!["7.5-GA", "7.6-GA"]);

    let all = discover(dir.path(), "*", &DiscoveryMode::Directories).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_manifest_mode_strips_suffix() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("7.5-GA.sums"), b"").unwrap();
    fs::write(dir.path().join("7.6-GA.sums"), b"").unwrap();
    fs::write(dir.path().join("7.6-GA.txt"), b"").unwrap();
    fs::create_dir(dir.path().join("7.4-GA")).unwrap();

    let releases =
        sort_releases(discover(dir.path(), "0", &DiscoveryMode::manifests()).unwrap()).unwrap();
    assert_eq!(ids(&releases), vec!["7.5-GA", "7.6-GA"]);
}

#[test]
fn test_invalid_filter() {
    let dir = tempdir().unwrap();
    let err = discover(dir.path(), "7.x", &DiscoveryMode::Directories).unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidFilter(_)));
}

#[test]
fn test_missing_base_dir() {
    let err = discover(
        std::path::Path::new("/non/existent/releases"),
        "0",
        &DiscoveryMode::Directories,
    )
    .unwrap_err();
    assert!(matches!(err, DiscoveryError::Io { .. }));
}
