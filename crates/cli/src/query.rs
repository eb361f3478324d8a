// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Minimal graph introspection (§10.O).
//!
//! A full query language with set algebra over target expressions is out
//! of scope; this module answers exactly the questions the CLI's `query`
//! subcommand needs — list every target, or resolve one target's direct
//! dependencies and dependents — against an already-built [`Graph`].

use crate::graph::{Graph, TargetId};

/// One answer to a `query` invocation, ready for formatting by the CLI.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// Every target id in the graph, topologically sorted.
    All(Vec<TargetId>),
    /// The direct dependencies of a single target.
    Deps(Vec<TargetId>),
    /// The direct dependents (reverse dependencies) of a single target.
    Dependents(Vec<TargetId>),
}

impl QueryResult {
    pub fn targets(&self) -> &[TargetId] {
        match self {
            QueryResult::All(t) | QueryResult::Deps(t) | QueryResult::Dependents(t) => t,
        }
    }
}

/// The supported query expressions. `expr` is matched literally rather than
/// parsed as a grammar:
/// - `//...` or `all` lists every target
/// - `deps(<target>)` lists a target's direct dependencies
/// - `dependents(<target>)` lists a target's direct dependents
pub fn run(graph: &Graph, expr: &str) -> crate::error::Result<QueryResult> {
    let expr = expr.trim();

    if expr == "all" || expr == "//..." {
        let all = graph
            .topological_order()
            .iter()
            .map(|&idx| graph.node_at(idx).target.id.clone())
            .collect();
        return Ok(QueryResult::All(all));
    }

    if let Some(inner) = strip_call(expr, "deps") {
        let idx = resolve(graph, inner)?;
        let deps = graph
            .dependencies(idx)
            .map(|d| graph.node_at(d).target.id.clone())
            .collect();
        return Ok(QueryResult::Deps(deps));
    }

    if let Some(inner) = strip_call(expr, "dependents") {
        let idx = resolve(graph, inner)?;
        let dependents = graph
            .dependents(idx)
            .map(|d| graph.node_at(d).target.id.clone())
            .collect();
        return Ok(QueryResult::Dependents(dependents));
    }

    // A bare target id queries itself as a single-element "all" result.
    let idx = resolve(graph, expr)?;
    Ok(QueryResult::All(vec![
        graph.node_at(idx).target.id.clone()
    ]))
}

fn strip_call<'a>(expr: &'a str, name: &str) -> Option<&'a str> {
    let rest = expr.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.trim())
}

fn resolve(graph: &Graph, id: &str) -> crate::error::Result<crate::graph::NodeIndex> {
    graph
        .index_of(&TargetId::new(id))
        .ok_or_else(|| crate::error::Error::TargetNotFound {
            id: TargetId::new(id),
            suggestions: crate::analyzer::suggest(
                id,
                graph.all_indices().map(|idx| graph.node_at(idx).target.id.as_str()),
            ),
        })
}
