//! Behavioral specs for `forge build`: graph resolution, dependency
//! ordering, action caching across builds, and cycle detection.

use std::fs;

use crate::prelude::*;

#[test]
fn empty_target_list_builds_successfully() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "forge.toml", "version = 1\n");

    forge_cmd(dir.path()).args(["build"]).assert().success();
}

#[test]
fn linear_chain_of_three_builds_in_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "a\n");

    let mut toml = "version = 1\n".to_string();
    toml.push_str(&copy_target("//:a", "a.txt", "out_a.txt", &[]));
    toml.push_str(&copy_target("//:b", "out_a.txt", "out_b.txt", &[":a"]));
    toml.push_str(&copy_target("//:c", "out_b.txt", "out_c.txt", &[":b"]));
    write(dir.path(), "forge.toml", &toml);

    forge_cmd(dir.path()).args(["build"]).assert().success();

    assert!(dir.path().join(".forge/out/out_c.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join(".forge/out/out_c.txt")).unwrap(),
        "a\n"
    );
}

#[test]
fn diamond_second_build_is_fully_cached() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "a\n");

    let mut toml = "version = 1\n".to_string();
    toml.push_str(&copy_target("//:a", "a.txt", "out_a.txt", &[]));
    toml.push_str(&copy_target("//:b", "out_a.txt", "out_b.txt", &[":a"]));
    toml.push_str(&copy_target("//:c", "out_a.txt", "out_c.txt", &[":a"]));
    toml.push_str(&copy_target("//:d", "out_b.txt", "out_d.txt", &[":b", ":c"]));
    write(dir.path(), "forge.toml", &toml);

    forge_cmd(dir.path()).args(["build"]).assert().success();
    let runs_after_first = fs::read_to_string(dir.path().join("runs.log"))
        .unwrap()
        .lines()
        .count();
    assert_eq!(runs_after_first, 4);

    forge_cmd(dir.path()).args(["build"]).assert().success();
    let runs_after_second = fs::read_to_string(dir.path().join("runs.log"))
        .unwrap()
        .lines()
        .count();
    assert_eq!(
        runs_after_second, runs_after_first,
        "second build with no source changes should be fully cached"
    );
}

#[test]
fn cycle_detection_fails_the_build() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x.txt", "x\n");

    let toml = r#"
version = 1

[[targets]]
name = "//:x"
kind = "custom"
srcs = ["x.txt"]
deps = [":z"]
output = "out_x.txt"
command = ["sh", "-c", "cp x.txt out_x.txt"]

[[targets]]
name = "//:y"
kind = "custom"
srcs = ["x.txt"]
deps = [":x"]
output = "out_y.txt"
command = ["sh", "-c", "cp x.txt out_y.txt"]

[[targets]]
name = "//:z"
kind = "custom"
srcs = ["x.txt"]
deps = [":y"]
output = "out_z.txt"
command = ["sh", "-c", "cp x.txt out_z.txt"]
"#;
    write(dir.path(), "forge.toml", toml);

    forge_cmd(dir.path())
        .args(["build"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("circular"));
}
