// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Workspace config discovery.
//!
//! Walks from the current directory up to the git root looking for
//! `forge.toml`.

use std::path::{Path, PathBuf};

use crate::config::{BUILD_FILE_NAME, ExcludeConfig};
use crate::error::{Error, Result};
use crate::walker::FileWalker;

/// Find `forge.toml` starting from `start_dir` and walking up to the git root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();

    loop {
        let config_path = current.join("forge.toml");
        if config_path.exists() {
            return Some(config_path);
        }

        if current.join(".git").exists() {
            return None;
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return None,
        }
    }
}

/// Resolve config path from CLI arg, env var, or discovery.
///
/// Priority:
/// 1. CLI flag `-C`/`--config` (handled by clap with env = "FORGE_CONFIG")
/// 2. Discovery from current directory up to git root
/// 3. None (use defaults)
pub fn resolve_config(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            if path.exists() {
                Ok(Some(path.to_path_buf()))
            } else {
                Err(Error::InvalidConfigValue {
                    field: path.display().to_string(),
                    message: "config file not found".to_string(),
                })
            }
        }
        None => Ok(find_config(cwd)),
    }
}

/// Find every per-package `BUILD.toml` under `workspace_root`, honoring the
/// same exclude patterns the source analyzer uses for glob expansion so a
/// directory carved out of the build is also carved out of target
/// discovery.
pub fn find_build_files(workspace_root: &Path, exclude: &ExcludeConfig) -> Vec<PathBuf> {
    let (files, _stats) =
        FileWalker::from_exclude_config(exclude).walk_collect(workspace_root);
    files
        .into_iter()
        .map(|f| f.path)
        .filter(|path| path.file_name().and_then(|n| n.to_str()) == Some(BUILD_FILE_NAME))
        .collect()
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
