#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::time::Duration;

use tempfile::tempdir;

use super::*;
use crate::graph::{Target, TargetKind};

fn target(id: &str, deps: &[&str]) -> Target {
    Target {
        id: TargetId::new(id),
        kind: TargetKind::Library,
        language: "generic".to_string(),
        sources: Vec::new(),
        dependencies: deps.iter().map(|d| TargetId::new(*d)).collect(),
        dependency_outputs: Vec::new(),
        output_path: None,
        command: Vec::new(),
        env: std::collections::BTreeMap::new(),
        config: HashMap::new(),
    }
}

fn two_target_graph() -> Graph {
    Graph::build(vec![target("//a:a", &[]), target("//b:b", &["//a:a"])]).unwrap()
}

#[test]
fn capture_only_records_terminal_statuses() {
    let graph = two_target_graph();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Success).unwrap();

    let checkpoint = Checkpoint::capture(&graph);
    assert_eq!(checkpoint.records().len(), 1);
    assert_eq!(checkpoint.records()[0].target, TargetId::new("//a:a"));
}

#[test]
fn round_trips_through_disk() {
    let graph = two_target_graph();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Success).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoint.bin");
    Checkpoint::capture(&graph).save(&path).unwrap();

    let loaded = Checkpoint::load(&path).unwrap();
    assert_eq!(loaded.records().len(), 1);
    assert!(loaded.is_fresh(Duration::from_secs(3600)));
}

#[test]
fn rejects_file_missing_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoint.bin");
    std::fs::write(&path, b"not a checkpoint").unwrap();
    assert!(Checkpoint::load(&path).is_err());
}

#[test]
fn smart_resume_requeues_failed_targets() {
    let graph = two_target_graph();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Failed).unwrap();
    let checkpoint = Checkpoint::capture(&graph);

    let fresh_graph = two_target_graph();
    checkpoint.apply(&fresh_graph, ResumeStrategy::Smart).unwrap();
    assert_eq!(fresh_graph.node_at(a).status(), Status::Pending);
}

#[test]
fn skip_failed_resume_keeps_failed_marker() {
    let graph = two_target_graph();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Failed).unwrap();
    let checkpoint = Checkpoint::capture(&graph);

    let fresh_graph = two_target_graph();
    checkpoint.apply(&fresh_graph, ResumeStrategy::SkipFailed).unwrap();
    assert_eq!(fresh_graph.node_at(a).status(), Status::Failed);
}

#[test]
fn rebuild_all_ignores_checkpoint() {
    let graph = two_target_graph();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Success).unwrap();
    let checkpoint = Checkpoint::capture(&graph);

    let fresh_graph = two_target_graph();
    checkpoint.apply(&fresh_graph, ResumeStrategy::RebuildAll).unwrap();
    assert_eq!(fresh_graph.node_at(a).status(), Status::Pending);
}

#[test]
fn invalid_when_target_removed_from_declarations() {
    let graph = two_target_graph();
    let checkpoint = Checkpoint::capture(&graph);

    let smaller = Graph::build(vec![target("//a:a", &[])]).unwrap();
    assert!(checkpoint.is_valid_for(&smaller));

    let unrelated = Graph::build(vec![target("//c:c", &[])]).unwrap();
    let a = graph.index_of(&TargetId::new("//a:a")).unwrap();
    graph.mark(a, Status::Ready).unwrap();
    graph.mark(a, Status::Building).unwrap();
    graph.mark(a, Status::Success).unwrap();
    let checkpoint = Checkpoint::capture(&graph);
    assert!(!checkpoint.is_valid_for(&unrelated));
}
