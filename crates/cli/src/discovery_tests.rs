#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn finds_config_in_current_dir() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("forge.toml");
    fs::write(&config_path, "version = 1\n").unwrap();

    let found = find_config(dir.path());
    assert_eq!(found, Some(config_path));
}

#[test]
fn finds_config_in_parent_dir() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("forge.toml");
    fs::write(&config_path, "version = 1\n").unwrap();

    let subdir = dir.path().join("subdir");
    fs::create_dir(&subdir).unwrap();

    let found = find_config(&subdir);
    assert_eq!(found, Some(config_path));
}

#[test]
fn stops_at_git_root() {
    let dir = tempdir().unwrap();

    // Create .git directory (git root marker)
    let git_dir = dir.path().join(".git");
    fs::create_dir(&git_dir).unwrap();

    // Create subdir without config
    let subdir = dir.path().join("subdir");
    fs::create_dir(&subdir).unwrap();

    // No config anywhere - should return None at git root
    let found = find_config(&subdir);
    assert_eq!(found, None);
}

#[test]
fn finds_config_before_git_root() {
    let dir = tempdir().unwrap();

    // Create .git directory
    let git_dir = dir.path().join(".git");
    fs::create_dir(&git_dir).unwrap();

    // Create config at git root
    let config_path = dir.path().join("forge.toml");
    fs::write(&config_path, "version = 1\n").unwrap();

    // Create subdir
    let subdir = dir.path().join("subdir");
    fs::create_dir(&subdir).unwrap();

    let found = find_config(&subdir);
    assert_eq!(found, Some(config_path));
}

#[test]
fn returns_none_when_no_config() {
    let dir = tempdir().unwrap();

    // Create .git directory to stop at
    let git_dir = dir.path().join(".git");
    fs::create_dir(&git_dir).unwrap();

    let found = find_config(dir.path());
    assert_eq!(found, None);
}

#[test]
fn resolve_explicit_path_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("custom.toml");
    fs::write(&config_path, "version = 1\n").unwrap();

    let result = resolve_config(Some(&config_path), dir.path());
    assert_eq!(result.unwrap(), Some(config_path));
}

#[test]
fn resolve_explicit_path_not_found() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("nonexistent.toml");

    let result = resolve_config(Some(&config_path), dir.path());
    assert!(result.is_err());
}

#[test]
fn resolve_discovers_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("forge.toml");
    fs::write(&config_path, "version = 1\n").unwrap();

    let result = resolve_config(None, dir.path());
    assert_eq!(result.unwrap(), Some(config_path));
}

#[test]
fn resolve_returns_none_when_no_config() {
    let dir = tempdir().unwrap();

    // Create .git to stop discovery
    let git_dir = dir.path().join(".git");
    fs::create_dir(&git_dir).unwrap();

    let result = resolve_config(None, dir.path());
    assert_eq!(result.unwrap(), None);
}

#[test]
fn finds_nested_build_files() {
    let dir = tempdir().unwrap();
    let pkg_a = dir.path().join("services/api");
    let pkg_b = dir.path().join("libs/util");
    fs::create_dir_all(&pkg_a).unwrap();
    fs::create_dir_all(&pkg_b).unwrap();
    fs::write(pkg_a.join("BUILD.toml"), "targets = []\n").unwrap();
    fs::write(pkg_b.join("BUILD.toml"), "targets = []\n").unwrap();
    fs::write(dir.path().join("forge.toml"), "version = 1\n").unwrap();

    let mut found = find_build_files(dir.path(), &ExcludeConfig::default());
    found.sort();

    let mut expected = vec![pkg_a.join("BUILD.toml"), pkg_b.join("BUILD.toml")];
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn ignores_excluded_directories() {
    let dir = tempdir().unwrap();
    let kept = dir.path().join("kept");
    let skipped = dir.path().join("vendor");
    fs::create_dir_all(&kept).unwrap();
    fs::create_dir_all(&skipped).unwrap();
    fs::write(kept.join("BUILD.toml"), "targets = []\n").unwrap();
    fs::write(skipped.join("BUILD.toml"), "targets = []\n").unwrap();

    let exclude = ExcludeConfig {
        patterns: vec!["vendor/**".to_string()],
    };
    let found = find_build_files(dir.path(), &exclude);
    assert_eq!(found, vec![kept.join("BUILD.toml")]);
}
