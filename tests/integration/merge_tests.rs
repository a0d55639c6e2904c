use reldedup::actions::{
    FileStat, MergeConfig, MergeEngine, MergeFs, MergeOutcome, StdFs,
};
use reldedup::duplicates::DuplicateSet;
use reldedup::release::sort_releases;
use std::fs;
use std::io;
use std::path::Path;
use tempfile::tempdir;

/// Refuses every hardlink.
struct NoLinkFs;

impl MergeFs for NoLinkFs {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        StdFs.stat(path)
    }
    fn exists(&self, path: &Path) -> bool {
        StdFs.exists(path)
    }
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        StdFs.rename(from, to)
    }
    fn hard_link(&self, _original: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "links disabled"))
    }
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        StdFs.remove_file(path)
    }
}

fn release_tree(base: &Path, release: &str, files: &[(&str, &[u8])]) {
    for (path, content) in files {
        let full = base.join(release).join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
}

#[test]
fn test_induced_link_failure_restores_every_file() {
    let dir = tempdir().unwrap();
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    release_tree(dir.path(), "7.6-GA", &[("lib/core.so", &payload), ("a.txt", b"a")]);
    release_tree(dir.path(), "7.5-GA", &[("lib/core.so", &payload), ("a.txt", b"a")]);

    let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
    let mut dups = DuplicateSet::new();
    for path in ["lib/core.so", "a.txt"] {
        for release in &releases {
            dups.insert(path, release.clone());
        }
    }

    let engine = MergeEngine::with_fs(NoLinkFs, MergeConfig::default());
    let report = engine.merge_all(dir.path(), &dups);

    assert_eq!(report.failed, 2);
    assert_eq!(report.linked, 0);
    assert!(report
        .records
        .iter()
        .all(|r| matches!(r.outcome, MergeOutcome::RolledBack(_))));
    assert_eq!(
        fs::read(dir.path().join("7.5-GA/lib/core.so")).unwrap(),
        payload
    );
    assert_eq!(fs::read(dir.path().join("7.5-GA/a.txt")).unwrap(), b"a");
    assert!(!dir.path().join("7.5-GA/a.txt.bak").exists());
}

#[test]
fn test_missing_member_is_reported_and_others_continue() {
    let dir = tempdir().unwrap();
    release_tree(dir.path(), "7.6-GA", &[("a.txt", b"a"), ("b.txt", b"b")]);
    release_tree(dir.path(), "7.5-GA", &[("b.txt", b"b")]);

    let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
    let mut dups = DuplicateSet::new();
    for path in ["a.txt", "b.txt"] {
        for release in &releases {
            dups.insert(path, release.clone());
        }
    }

    let engine = MergeEngine::new(MergeConfig::default());
    let report = engine.merge_all(dir.path(), &dups);

    assert_eq!(report.records.len(), 2);
    assert!(matches!(
        report.records[0].outcome,
        MergeOutcome::MissingDuplicate(_)
    ));
    assert_eq!(report.failed, 1);
    #[cfg(unix)]
    assert_eq!(report.linked, 1);
}

#[test]
#[cfg(unix)]
fn test_dry_run_report() {
    let dir = tempdir().unwrap();
    release_tree(dir.path(), "7.6-GA", &[("a.txt", b"0123456789")]);
    release_tree(dir.path(), "7.5-GA", &[("a.txt", b"0123456789")]);

    let releases = sort_releases(["7.5-GA", "7.6-GA"]).unwrap();
    let mut dups = DuplicateSet::new();
    for release in &releases {
        dups.insert("a.txt", release.clone());
    }

    let engine = MergeEngine::new(MergeConfig::default().with_dry_run(true));
    let report = engine.merge_all(dir.path(), &dups);

    assert!(report.dry_run);
    assert_eq!(report.would_link, 1);
    assert_eq!(report.bytes_reclaimed, 10);
    assert!(report.summary().starts_with("Dry run"));
    assert!(!reldedup::scanner::hardlink::same_file(
        &dir.path().join("7.6-GA/a.txt"),
        &dir.path().join("7.5-GA/a.txt")
    )
    .unwrap());
}
