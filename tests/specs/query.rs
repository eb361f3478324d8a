//! Behavioral specs for `forge query`.

use crate::prelude::*;

#[test]
fn query_all_lists_every_target() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "a\n");
    let mut toml = "version = 1\n".to_string();
    toml.push_str(&copy_target("//:a", "a.txt", "out_a.txt", &[]));
    toml.push_str(&copy_target("//:b", "out_a.txt", "out_b.txt", &[":a"]));
    write(dir.path(), "forge.toml", &toml);

    forge_cmd(dir.path())
        .args(["query", "all"])
        .assert()
        .success()
        .stdout(contains("//:a"))
        .stdout(contains("//:b"));
}
