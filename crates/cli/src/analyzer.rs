// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Dependency analysis: turns declared targets into a resolved [`Graph`]
//! (§4.E).
//!
//! Three kinds of target references appear in `forge.toml`:
//! - `//path/to/pkg:name` — fully qualified, absolute from the workspace root
//! - `:name` — local shorthand, resolved against the declaring package
//! - `@repo//path:name` — external workspace reference (§3); forge resolves
//!   these against a configured external-repo root but never fetches one
//!   itself (fetching is out of scope, per spec Non-goals)
//!
//! Source globs are expanded relative to each target's package directory
//! using the same gitignore-aware walker the rest of the core uses, so a
//! target's `srcs` never silently picks up a file a `.gitignore` excludes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSetBuilder};

use crate::config::{ExcludeConfig, TargetDecl};
use crate::error::{Error, Result};
use crate::graph::{Graph, Target, TargetId};
use crate::walker::{FileWalker, WalkerConfig};

/// Resolve a target reference string against the package that declared it.
///
/// `//a/b:c` and `@repo//a/b:c` are returned as-is (already absolute).
/// `:name` is rewritten to `//<declaring_package>:name`.
pub fn resolve_reference(reference: &str, declaring_package: &str) -> TargetId {
    if reference.starts_with("//") || reference.starts_with('@') {
        TargetId::new(reference)
    } else if let Some(name) = reference.strip_prefix(':') {
        TargetId::new(format!("{declaring_package}:{name}"))
    } else {
        TargetId::new(reference)
    }
}

/// Split a fully qualified target id into its package and local name, e.g.
/// `//services/api:server` -> (`//services/api`, `server`).
pub fn split_package(id: &str) -> (&str, &str) {
    match id.rsplit_once(':') {
        Some((package, name)) => (package, name),
        None => (id, ""),
    }
}

/// Expand a target's `srcs` glob patterns into concrete files under
/// `package_root`, respecting the workspace's exclude configuration.
pub fn expand_sources(
    package_root: &Path,
    patterns: &[String],
    exclude: &ExcludeConfig,
) -> Result<Vec<PathBuf>> {
    if patterns.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidGlob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    let globset = builder.build().map_err(|e| Error::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })?;

    let walker = FileWalker::new(WalkerConfig {
        exclude_patterns: exclude.patterns.clone(),
        ..Default::default()
    });
    let (files, _stats) = walker.walk_collect(package_root);

    let mut matched: Vec<PathBuf> = files
        .into_iter()
        .filter(|f| {
            f.path
                .strip_prefix(package_root)
                .map(|rel| globset.is_match(rel))
                .unwrap_or(false)
        })
        .map(|f| f.path)
        .collect();
    matched.sort();
    Ok(matched)
}

/// Resolve every declared target's references and build the final graph.
///
/// `package_roots` maps each target id's package portion to the directory
/// its `srcs` globs are expanded against (normally `workspace_root` joined
/// with the package path encoded in the target name).
pub fn build_graph(
    decls: &[TargetDecl],
    workspace_root: &Path,
    exclude: &ExcludeConfig,
) -> Result<Graph> {
    let mut targets = Vec::with_capacity(decls.len());

    for decl in decls {
        // A target with neither sources of its own nor a dependency to
        // transform is an empty declaration, not a legitimate dependency-only
        // target (§8: "single target with no sources ⇒ MissingField").
        if decl.srcs.is_empty() && decl.deps.is_empty() {
            return Err(Error::MissingField {
                target: TargetId::new(decl.name.clone()),
                field: "srcs".to_string(),
            });
        }

        let (package, _name) = split_package(&decl.name);
        let package_root = workspace_root.join(package.trim_start_matches("//"));

        let dependencies: Vec<TargetId> = decl
            .deps
            .iter()
            .map(|d| resolve_reference(d, package))
            .collect();

        let sources = expand_sources(&package_root, &decl.srcs, exclude)?;

        targets.push(Target {
            id: TargetId::new(decl.name.clone()),
            kind: decl.kind.into(),
            language: decl.language.clone(),
            sources,
            dependencies,
            dependency_outputs: Vec::new(),
            output_path: decl.output.as_ref().map(PathBuf::from),
            command: decl.command.clone(),
            env: decl.env.clone(),
            config: decl.config.clone(),
        });
    }

    validate_references(&targets)?;
    resolve_dependency_outputs(&mut targets);
    Graph::build(targets)
}

/// Fill in each target's `dependency_outputs` from its dependencies'
/// declared `output_path`, now that every target in the list is known.
fn resolve_dependency_outputs(targets: &mut [Target]) {
    let outputs: BTreeMap<TargetId, Option<PathBuf>> = targets
        .iter()
        .map(|t| (t.id.clone(), t.output_path.clone()))
        .collect();

    for target in targets.iter_mut() {
        target.dependency_outputs = target
            .dependencies
            .iter()
            .filter_map(|dep| outputs.get(dep).cloned().flatten())
            .collect();
    }
}

/// Check every declared dependency resolves to a known target before
/// handing the list to [`Graph::build`], so an unresolved reference reports
/// `TargetNotFound` with spelling suggestions rather than the more generic
/// `MissingDependency` the graph itself raises.
fn validate_references(targets: &[Target]) -> Result<()> {
    let known: BTreeMap<&str, ()> = targets.iter().map(|t| (t.id.as_str(), ())).collect();

    for target in targets {
        for dep in &target.dependencies {
            if !known.contains_key(dep.as_str()) {
                let suggestions = suggest(dep.as_str(), known.keys().copied());
                return Err(Error::TargetNotFound {
                    id: dep.clone(),
                    suggestions,
                });
            }
        }
    }
    Ok(())
}

/// Suggest up to 3 known target ids within edit distance 3 of `query`.
pub fn suggest<'a>(query: &str, candidates: impl Iterator<Item = &'a str>) -> Vec<TargetId> {
    const MAX_DISTANCE: usize = 3;
    const MAX_SUGGESTIONS: usize = 3;

    let mut scored: Vec<(usize, &str)> = candidates
        .map(|c| (levenshtein(query, c), c))
        .filter(|(dist, _)| *dist <= MAX_DISTANCE)
        .collect();
    scored.sort_by_key(|(dist, name)| (*dist, *name));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| TargetId::new(name))
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
#[path = "analyzer_tests.rs"]
mod tests;
