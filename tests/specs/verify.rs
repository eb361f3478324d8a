//! Behavioral specs for `forge verify`.

use crate::prelude::*;

#[test]
fn verify_emits_a_passing_certificate_for_an_acyclic_graph() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "a\n");
    let mut toml = "version = 1\n".to_string();
    toml.push_str(&copy_target("//:a", "a.txt", "out_a.txt", &[]));
    write(dir.path(), "forge.toml", &toml);

    forge_cmd(dir.path())
        .args(["verify"])
        .assert()
        .success()
        .stdout(contains("\"acyclic\": true"));
}
