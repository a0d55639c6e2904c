use reldedup::config::Config;
use reldedup::dedup;
use reldedup::scanner::hardlink::same_file;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn config() -> Config {
    Config {
        jobs: 4,
        ..Config::default()
    }
}

fn write(base: &Path, release: &str, path: &str, content: &[u8]) {
    let full = base.join(release).join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

#[test]
#[cfg(unix)]
fn test_three_releases_merged_into_newest() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    for release in ["6.10-GA", "7.5-GA", "7.6-GA"] {
        write(base, release, "docs/readme.txt", b"shared readme\n");
    }
    write(base, "6.10-GA", "bin/tool", b"tool v6");
    write(base, "7.5-GA", "bin/tool", b"tool v7");
    write(base, "7.6-GA", "bin/tool", b"tool v7.6");

    let report = dedup(base, "0", &config(), false, None).unwrap();
    assert_eq!(report.linked, 2);
    assert_eq!(report.failed, 0);

    let canonical = base.join("7.6-GA/docs/readme.txt");
    for release in ["6.10-GA", "7.5-GA"] {
        let path = base.join(release).join("docs/readme.txt");
        assert!(same_file(&canonical, &path).unwrap(), "{release} not linked");
        assert!(!base.join(release).join("docs/readme.txt.bak").exists());
    }
    assert_eq!(fs::read(base.join("7.5-GA/bin/tool")).unwrap(), b"tool v7");
    assert!(!same_file(&base.join("7.5-GA/bin/tool"), &base.join("7.6-GA/bin/tool")).unwrap());

    let again = dedup(base, "0", &config(), false, None).unwrap();
    assert_eq!(again.linked, 0);
    assert_eq!(again.identical, 2);
    assert_eq!(again.failed, 0);
}

#[test]
#[cfg(unix)]
fn test_major_filter_limits_merge() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    for release in ["6.10-GA", "7.5-GA", "7.6-GA"] {
        write(base, release, "a.txt", b"same");
    }

    let report = dedup(base, "7", &config(), false, None).unwrap();
    assert_eq!(report.linked, 1);
    assert!(same_file(&base.join("7.5-GA/a.txt"), &base.join("7.6-GA/a.txt")).unwrap());
    assert!(!same_file(&base.join("6.10-GA/a.txt"), &base.join("7.6-GA/a.txt")).unwrap());
}

#[test]
#[cfg(unix)]
fn test_manifest_mode_end_to_end() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    write(base, "7.5-GA", "a.txt", b"A");
    write(base, "7.5-GA", "b.txt", b"B-old");
    write(base, "7.6-GA", "a.txt", b"A");
    write(base, "7.6-GA", "b.txt", b"B-new");
    fs::write(base.join("7.5-GA.sums"), "h1  ./a.txt\nh2  ./b.txt\n").unwrap();
    fs::write(base.join("7.6-GA.sums"), "h1  ./a.txt\nh3  ./b.txt\n").unwrap();

    let config = Config {
        use_manifests: true,
        ..config()
    };
    let report = dedup(base, "0", &config, false, None).unwrap();

    assert_eq!(report.linked, 1);
    assert_eq!(report.records[0].path, "a.txt");
    assert!(same_file(&base.join("7.5-GA/a.txt"), &base.join("7.6-GA/a.txt")).unwrap());
    assert_eq!(fs::read(base.join("7.5-GA/b.txt")).unwrap(), b"B-old");
}

#[test]
fn test_single_release_is_a_clean_no_op() {
    let dir = tempdir().unwrap();
    write(dir.path(), "7.6-GA", "a.txt", b"only");

    let report = dedup(dir.path(), "0", &config(), false, None).unwrap();
    assert_eq!(report.total_count(), 0);
}

#[test]
fn test_dry_run_leaves_tree_untouched() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    write(base, "7.5-GA", "a.txt", b"same");
    write(base, "7.6-GA", "a.txt", b"same");

    let report = dedup(base, "0", &config(), true, None).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.linked, 0);
    #[cfg(unix)]
    {
        assert_eq!(report.would_link, 1);
        assert!(!same_file(&base.join("7.5-GA/a.txt"), &base.join("7.6-GA/a.txt")).unwrap());
    }
}

#[test]
#[cfg(unix)]
fn test_decomposed_file_name_is_merged() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    let name = "docs/cafe\u{0301}.txt";
    for release in ["7.5-GA", "7.6-GA"] {
        write(base, release, name, b"identical");
    }

    let report = dedup(base, "0", &config(), false, None).unwrap();
    assert_eq!(report.linked, 1, "records: {:?}", report.records);
    assert_eq!(report.failed, 0);
    assert_eq!(report.records[0].path, name);
    assert!(same_file(&base.join("7.6-GA").join(name), &base.join("7.5-GA").join(name)).unwrap());
}

#[test]
#[cfg(unix)]
fn test_names_differing_only_in_composition_stay_apart() {
    let dir = tempdir().unwrap();
    let base = dir.path();
    let decomposed = "cafe\u{0301}.txt";
    let composed = "caf\u{e9}.txt";
    for release in ["7.5-GA", "7.6-GA"] {
        write(base, release, decomposed, b"decomposed");
        write(base, release, composed, b"composed");
    }

    let report = dedup(base, "0", &config(), false, None).unwrap();
    assert_eq!(report.linked, 2);
    for name in [decomposed, composed] {
        let newest = base.join("7.6-GA").join(name);
        let older = base.join("7.5-GA").join(name);
        assert!(same_file(&newest, &older).unwrap(), "{name} not linked");
    }
    assert_eq!(fs::read(base.join("7.5-GA").join(composed)).unwrap(), b"composed");
}
