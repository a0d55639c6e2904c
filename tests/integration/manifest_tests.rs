use reldedup::release::sort_releases;
use reldedup::scanner::fanout::{load_manifests, FanoutConfig};
use reldedup::scanner::manifest::{parse_line, parse_manifest, ManifestLine};
use reldedup::scanner::{build_fingerprint_map, LiveConfig, Strategy};
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_manifest_line_with_spaces_in_path() {
    assert_eq!(
        parse_line("deadbeef  ./file with spaces.txt"),
        ManifestLine::Entry {
            path: "file with spaces.txt".to_string(),
            digest: "deadbeef".to_string(),
        }
    );
}

#[test]
fn test_single_field_line_is_skipped() {
    let map = parse_manifest("deadbeef\ncafe  ./ok.txt\n".as_bytes(), "inline").unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("ok.txt"), Some("cafe"));
}

#[test]
fn test_manifest_and_live_maps_agree() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("7.6-GA");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir_all(root.join("bin")).unwrap();
    fs::write(root.join("docs/readme.txt"), b"hello\n").unwrap();
    fs::write(root.join("bin/tool"), b"\x7fELF tool").unwrap();
    fs::write(root.join("file with spaces.txt"), b"spaces").unwrap();

    let live = build_fingerprint_map(&root, &Strategy::Live(LiveConfig::default())).unwrap();

    let mut manifest = String::new();
    let mut entries: Vec<_> = live.iter().collect();
    entries.sort();
    for (path, digest) in entries {
        manifest.push_str(&format!("{digest}  ./{path}\n"));
    }
    let manifest_path = dir.path().join("7.6-GA.sums");
    fs::write(&manifest_path, manifest).unwrap();

    let parsed = build_fingerprint_map(&manifest_path, &Strategy::Manifest).unwrap();
    assert_eq!(parsed, live);
}

#[test]
#[cfg(unix)]
fn test_sha256sum_output_matches_live_hash() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("7.6-GA");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/readme.txt"), b"hello\n").unwrap();

    let output = Command::new("sha256sum")
        .arg("./docs/readme.txt")
        .current_dir(&root)
        .output();
    let Ok(output) = output else {
        eprintln!("Skipping: sha256sum not available");
        return;
    };
    if !output.status.success() {
        eprintln!("Skipping: sha256sum failed");
        return;
    }

    let from_tool = parse_manifest(output.stdout.as_slice(), "sha256sum").unwrap();
    let live = build_fingerprint_map(&root, &Strategy::Live(LiveConfig::default())).unwrap();
    assert_eq!(from_tool, live);
}

#[test]
fn test_fanout_loads_every_release() {
    let dir = tempdir().unwrap();
    let names: Vec<String> = (0..12).map(|i| format!("7.{i}-GA")).collect();
    for (i, name) in names.iter().enumerate() {
        fs::write(
            dir.path().join(format!("{name}.sums")),
            format!("h{i}  ./a.txt\nshared  ./b.txt\n"),
        )
        .unwrap();
    }

    let releases = sort_releases(names.iter().cloned()).unwrap();
    let mut config = FanoutConfig::new(dir.path());
    config.jobs = 3;
    let maps = load_manifests(&releases, &config).unwrap();

    assert_eq!(maps.len(), 12);
    assert_eq!(maps["7.11-GA"].get("a.txt"), Some("h11"));
    assert!(maps.values().all(|m| m.get("b.txt") == Some("shared")));
}
