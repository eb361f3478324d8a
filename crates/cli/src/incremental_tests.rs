#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;

use tempfile::tempdir;

use super::*;
use crate::graph::{Target, TargetKind};

fn target(id: &str, deps: &[&str], sources: &[&str]) -> Target {
    Target {
        id: TargetId::new(id),
        kind: TargetKind::Library,
        language: "generic".to_string(),
        sources: sources.iter().map(PathBuf::from).collect(),
        dependencies: deps.iter().map(|d| TargetId::new(*d)).collect(),
        dependency_outputs: Vec::new(),
        output_path: None,
        command: Vec::new(),
        env: std::collections::BTreeMap::new(),
        config: HashMap::new(),
    }
}

#[test]
fn unrecorded_source_is_always_changed() {
    let dir = tempdir().unwrap();
    let state = IncrementalState::open(dir.path().join("state.bin")).unwrap();
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "fn main() {}").unwrap();
    assert!(state.has_changed(&file).unwrap());
}

#[test]
fn unchanged_source_is_not_dirty_after_recording() {
    let dir = tempdir().unwrap();
    let mut state = IncrementalState::open(dir.path().join("state.bin")).unwrap();
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "fn main() {}").unwrap();

    state.record(&file).unwrap();
    assert!(!state.has_changed(&file).unwrap());
}

#[test]
fn edited_source_is_dirty_after_recording() {
    let dir = tempdir().unwrap();
    let mut state = IncrementalState::open(dir.path().join("state.bin")).unwrap();
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "fn main() {}").unwrap();
    state.record(&file).unwrap();

    std::fs::write(&file, "fn main() { loop {} }").unwrap();
    assert!(state.has_changed(&file).unwrap());
}

#[test]
fn state_round_trips_through_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.bin");
    let file = dir.path().join("a.rs");
    std::fs::write(&file, "data").unwrap();

    {
        let mut state = IncrementalState::open(&path).unwrap();
        state.record(&file).unwrap();
        state.persist().unwrap();
    }

    let reloaded = IncrementalState::open(&path).unwrap();
    assert!(!reloaded.has_changed(&file).unwrap());
}

#[test]
fn full_strategy_rebuilds_everything() {
    let graph = Graph::build(vec![target("//a:a", &[], &["a.rs"]), target("//b:b", &["//a:a"], &["b.rs"])]).unwrap();
    let affected = affected_targets(&graph, &HashSet::new(), InvalidationStrategy::Full);
    assert_eq!(affected.len(), 2);
}

#[test]
fn incremental_strategy_propagates_to_dependents() {
    let graph = Graph::build(vec![
        target("//a:a", &[], &["a.rs"]),
        target("//b:b", &["//a:a"], &["b.rs"]),
        target("//c:c", &[], &["c.rs"]),
    ])
    .unwrap();

    let changed: HashSet<PathBuf> = [PathBuf::from("a.rs")].into_iter().collect();
    let affected = affected_targets(&graph, &changed, InvalidationStrategy::Incremental);

    assert!(affected.contains(&TargetId::new("//a:a")));
    assert!(affected.contains(&TargetId::new("//b:b")));
    assert!(!affected.contains(&TargetId::new("//c:c")));
}

#[test]
fn minimal_strategy_does_not_propagate() {
    let graph = Graph::build(vec![
        target("//a:a", &[], &["a.rs"]),
        target("//b:b", &["//a:a"], &["b.rs"]),
    ])
    .unwrap();

    let changed: HashSet<PathBuf> = [PathBuf::from("a.rs")].into_iter().collect();
    let affected = affected_targets(&graph, &changed, InvalidationStrategy::Minimal);

    assert!(affected.contains(&TargetId::new("//a:a")));
    assert!(!affected.contains(&TargetId::new("//b:b")));
}
