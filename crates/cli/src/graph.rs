// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! The target graph: an immutable DAG of declared build targets (§4.D).
//!
//! The graph is an arena: a flat `Vec<Node>` indexed by a dense [`NodeIndex`],
//! with edges stored as index pairs in a reverse/forward adjacency list built
//! once at construction. This sidesteps cyclic ownership between a graph and
//! its nodes entirely — there is exactly one owner (the `Graph`) and all
//! external queries return indices or borrowed references, never a `Node`
//! that could outlive its arena.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A package-qualified target identifier, e.g. `//services/api:server`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The kind of buildable unit a [`Target`] declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Executable,
    Library,
    Test,
    Custom,
}

/// A declared unit of work. Immutable once the graph is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    pub language: String,
    pub sources: Vec<std::path::PathBuf>,
    pub dependencies: Vec<TargetId>,
    /// Output paths of this target's dependencies, resolved once at graph
    /// construction time so a driver can wire them in as
    /// `InputKind::DependencyOutput` without needing the whole graph in
    /// scope (§4.E).
    #[serde(default)]
    pub dependency_outputs: Vec<std::path::PathBuf>,
    pub output_path: Option<std::path::PathBuf>,
    pub command: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// Build-lifetime status of a single node. Transitions are validated by
/// [`Graph::mark`] against the state machine in §4.D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    Pending = 0,
    Ready = 1,
    Building = 2,
    Success = 3,
    Cached = 4,
    Failed = 5,
}

impl Status {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::Pending,
            1 => Status::Ready,
            2 => Status::Building,
            3 => Status::Success,
            4 => Status::Cached,
            5 => Status::Failed,
            _ => unreachable!("status byte out of range"),
        }
    }

    /// Whether a transition from `self` to `to` is legal per §4.D.
    fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Pending, Ready)
                | (Ready, Building)
                | (Building, Success)
                | (Building, Cached)
                | (Building, Failed)
                | (Failed, Ready)
        )
    }

    /// Whether this status counts as "satisfied" for a dependent's readiness.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, Status::Success | Status::Cached)
    }
}

/// A node wraps one target plus its mutable, atomically-updated build state.
pub struct Node {
    pub target: Target,
    status: AtomicU8,
    retry_attempts: std::sync::atomic::AtomicU32,
    last_error: std::sync::Mutex<Option<String>>,
    cached_output_hash: std::sync::Mutex<Option<[u8; 32]>>,
}

impl Node {
    fn new(target: Target) -> Self {
        Self {
            target,
            status: AtomicU8::new(Status::Pending as u8),
            retry_attempts: std::sync::atomic::AtomicU32::new(0),
            last_error: std::sync::Mutex::new(None),
            cached_output_hash: std::sync::Mutex::new(None),
        }
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.load(Ordering::Relaxed)
    }

    pub fn increment_retry(&self) -> u32 {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn set_last_error(&self, message: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(message.into());
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|g| g.clone())
    }

    pub fn set_cached_output_hash(&self, hash: [u8; 32]) {
        if let Ok(mut guard) = self.cached_output_hash.lock() {
            *guard = Some(hash);
        }
    }

    pub fn cached_output_hash(&self) -> Option<[u8; 32]> {
        *self.cached_output_hash.lock().ok()?
    }
}

/// Dense index into the graph's node arena.
pub type NodeIndex = usize;

/// An immutable dependency DAG of targets.
///
/// Construction validates every edge resolves and that the graph is acyclic;
/// after that, the node array and adjacency lists never change. Only node
/// *status* is mutable, and only through atomic operations.
pub struct Graph {
    nodes: Vec<Node>,
    id_to_index: HashMap<TargetId, NodeIndex>,
    /// `dependencies[i]` = direct predecessors (what `i` depends on).
    dependencies: Vec<Vec<NodeIndex>>,
    /// `dependents[i]` = direct successors (what depends on `i`).
    dependents: Vec<Vec<NodeIndex>>,
    topo_order: Vec<NodeIndex>,
}

impl Graph {
    /// Build a graph from a flat list of targets. Validates that every
    /// dependency reference resolves, then verifies acyclicity via
    /// topological sort. Ties in the sort break by target id, lexicographically,
    /// so the resulting order (and any serialization of it) is deterministic.
    pub fn build(targets: Vec<Target>) -> Result<Self> {
        let mut id_to_index = HashMap::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            id_to_index.insert(target.id.clone(), idx);
        }

        let mut dependencies = vec![Vec::new(); targets.len()];
        let mut dependents = vec![Vec::new(); targets.len()];

        for (idx, target) in targets.iter().enumerate() {
            for dep_id in &target.dependencies {
                let Some(&dep_idx) = id_to_index.get(dep_id) else {
                    return Err(Error::MissingDependency {
                        target: target.id.clone(),
                        dependency: dep_id.clone(),
                    });
                };
                dependencies[idx].push(dep_idx);
                dependents[dep_idx].push(idx);
            }
        }

        for deps in &mut dependencies {
            deps.sort_by_key(|&i| targets[i].id.clone());
        }
        for deps in &mut dependents {
            deps.sort_by_key(|&i| targets[i].id.clone());
        }

        let topo_order = topological_sort(&targets, &dependencies)?;

        let nodes = targets.into_iter().map(Node::new).collect();

        Ok(Self {
            nodes,
            id_to_index,
            dependencies,
            dependents,
            topo_order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &TargetId) -> Option<NodeIndex> {
        self.id_to_index.get(id).copied()
    }

    /// O(1) lookup by identifier.
    pub fn node(&self, id: &TargetId) -> Option<&Node> {
        self.id_to_index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn node_at(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx]
    }

    pub fn all_indices(&self) -> impl Iterator<Item = NodeIndex> {
        0..self.nodes.len()
    }

    /// Direct predecessors (what `id` depends on).
    pub fn dependencies(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dependencies[idx].iter().copied()
    }

    /// Direct successors (what depends on `id`).
    pub fn dependents(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.dependents[idx].iter().copied()
    }

    /// Deterministic topological order, ties broken by target id.
    pub fn topological_order(&self) -> &[NodeIndex] {
        &self.topo_order
    }

    /// All nodes eligible to start building: status `Ready` and every
    /// dependency `Success` or `Cached`. Declaration of `Ready` itself
    /// (the `Pending -> Ready` transition) is the caller's responsibility;
    /// this traversal is read-only.
    pub fn ready_nodes(&self) -> Vec<NodeIndex> {
        self.all_indices()
            .filter(|&idx| {
                self.nodes[idx].status() == Status::Ready
                    && self.dependencies[idx]
                        .iter()
                        .all(|&dep| self.nodes[dep].status().satisfies_dependency())
            })
            .collect()
    }

    /// Atomically transition a node's status, returning the prior status.
    /// Returns `Error::InvalidTransition` for illegal transitions (§4.D) —
    /// this is always a caller bug, never user-triggerable.
    pub fn mark(&self, idx: NodeIndex, to: Status) -> Result<Status> {
        let node = &self.nodes[idx];
        loop {
            let current = node.status.load(Ordering::Acquire);
            let current_status = Status::from_u8(current);
            if !current_status.can_transition_to(to) {
                return Err(Error::InvalidTransition {
                    target: node.target.id.clone(),
                    from: current_status,
                    to,
                });
            }
            if node
                .status
                .compare_exchange(
                    current,
                    to as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return Ok(current_status);
            }
        }
    }

    /// Re-affirm acyclicity of this graph instance. Always `true` in
    /// practice — [`Graph::build`] refuses to produce a cyclic graph, and
    /// the adjacency lists never change afterward — but [`crate::verify`]
    /// re-checks it explicitly rather than trusting construction-time state
    /// it cannot itself observe.
    pub fn verify_acyclic(&self) -> bool {
        self.topo_order.len() == self.nodes.len()
    }

    /// Mark every `Pending` node `Ready`. Called once after construction
    /// (or after a checkpoint restores a subset) to seed the scheduler.
    pub fn mark_all_ready(&self) -> Result<()> {
        for idx in self.all_indices() {
            if self.nodes[idx].status() == Status::Pending {
                self.mark(idx, Status::Ready)?;
            }
        }
        Ok(())
    }
}

/// Kahn's algorithm with a lexicographically-ordered ready set, so the
/// resulting order is a pure function of the target declarations (§8
/// idempotence: identical declarations produce byte-equal serialized graphs).
fn topological_sort(targets: &[Target], dependencies: &[Vec<NodeIndex>]) -> Result<Vec<NodeIndex>> {
    let n = targets.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
    for (idx, deps) in dependencies.iter().enumerate() {
        indegree[idx] = deps.len();
        for &dep in deps {
            dependents[dep].push(idx);
        }
    }
    for deps in &mut dependents {
        deps.sort_by_key(|&i| targets[i].id.clone());
    }

    let mut ready: std::collections::BTreeSet<(&str, NodeIndex)> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == 0)
        .map(|(idx, _)| (targets[idx].id.as_str(), idx))
        .collect();

    let mut order = Vec::with_capacity(n);
    let mut indegree = indegree;

    while let Some(&(_, idx)) = ready.iter().next() {
        ready.remove(&(targets[idx].id.as_str(), idx));
        order.push(idx);
        for &dep in &dependents[idx] {
            indegree[dep] -= 1;
            if indegree[dep] == 0 {
                ready.insert((targets[dep].id.as_str(), dep));
            }
        }
    }

    if order.len() != n {
        let cycle = find_cycle(targets, dependencies);
        return Err(Error::CircularDependency { cycle });
    }

    Ok(order)
}

/// DFS-based cycle extraction, used only for error reporting once Kahn's
/// algorithm has already determined a cycle exists.
fn find_cycle(targets: &[Target], dependencies: &[Vec<NodeIndex>]) -> Vec<TargetId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InStack,
        Done,
    }

    let n = targets.len();
    let mut marks = vec![Mark::Unvisited; n];
    let mut stack = Vec::new();

    fn visit(
        idx: NodeIndex,
        targets: &[Target],
        dependencies: &[Vec<NodeIndex>],
        marks: &mut [Mark],
        stack: &mut Vec<NodeIndex>,
    ) -> Option<Vec<TargetId>> {
        match marks[idx] {
            Mark::Done => return None,
            Mark::InStack => {
                let start = stack.iter().position(|&i| i == idx).unwrap_or(0);
                let mut cycle: Vec<TargetId> =
                    stack[start..].iter().map(|&i| targets[i].id.clone()).collect();
                cycle.push(targets[idx].id.clone());
                return Some(cycle);
            }
            Mark::Unvisited => {}
        }
        marks[idx] = Mark::InStack;
        stack.push(idx);
        for &dep in &dependencies[idx] {
            if let Some(cycle) = visit(dep, targets, dependencies, marks, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        marks[idx] = Mark::Done;
        None
    }

    for idx in 0..n {
        if marks[idx] == Mark::Unvisited {
            if let Some(cycle) = visit(idx, targets, dependencies, &mut marks, &mut stack) {
                return cycle;
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
