//! Behavioral specs for `forge clean`.

use crate::prelude::*;

#[test]
fn clean_removes_cache_and_output_dirs() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "a\n");
    let mut toml = "version = 1\n".to_string();
    toml.push_str(&copy_target("//:a", "a.txt", "out_a.txt", &[]));
    write(dir.path(), "forge.toml", &toml);

    forge_cmd(dir.path()).args(["build"]).assert().success();
    forge_cmd(dir.path()).args(["clean"]).assert().success();

    assert!(!dir.path().join(".forge/cache").exists());
}
