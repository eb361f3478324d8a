// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Content-addressed blob store (§4.B).
//!
//! Blobs live under `<root>/objects/<aa>/<bb><rest>`, sharded by the first
//! two hex characters of their BLAKE3 hash to keep any single directory
//! from accumulating too many entries. Writes land in a sibling temp file
//! and are renamed into place, so a reader never observes a partially
//! written blob. A sidecar access-time index backs size-weighted LRU
//! eviction when the store exceeds its configured budget.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::{hash_bytes, Fingerprint};

/// An entry in the access-time index used for eviction. `tick` is a logical
/// clock (not wall time), so ordering stays strict even when two accesses
/// land in the same second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct AccessRecord {
    size: u64,
    tick: u64,
}

/// A content-addressed store rooted at a directory on disk.
pub struct Store {
    root: PathBuf,
    index: DashMap<Fingerprint, AccessRecord>,
    index_path: PathBuf,
    index_lock: Mutex<()>,
    max_bytes: Option<u64>,
    clock: AtomicU64,
}

impl Store {
    /// Open (creating if necessary) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, max_bytes: Option<u64>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("objects")).map_err(|source| Error::Io {
            path: root.clone(),
            source,
        })?;

        let index_path = root.join("access-index.postcard");
        let index = load_index(&index_path).unwrap_or_default();
        let clock = index.iter().map(|e| e.tick).max().unwrap_or(0);

        Ok(Self {
            root,
            index,
            index_path,
            index_lock: Mutex::new(()),
            max_bytes,
            clock: AtomicU64::new(clock),
        })
    }

    fn blob_path(&self, hash: &Fingerprint) -> PathBuf {
        let hex = hash.to_hex();
        self.root
            .join("objects")
            .join(&hex[0..2])
            .join(&hex[2..])
    }

    /// True if a blob with this hash is present.
    pub fn has(&self, hash: &Fingerprint) -> bool {
        self.blob_path(hash).is_file()
    }

    /// Fetch and hash-verify a blob's bytes.
    pub fn get(&self, hash: &Fingerprint) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        let bytes = std::fs::read(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        if hash_bytes(&bytes) != *hash {
            return Err(Error::Corrupted {
                hash: hash.to_hex(),
            });
        }

        self.touch(hash, bytes.len() as u64);
        Ok(bytes)
    }

    /// Store bytes, returning their content hash. Idempotent: storing the
    /// same bytes twice is a cheap no-op on the second call.
    pub fn put(&self, bytes: &[u8]) -> Result<Fingerprint> {
        let hash = hash_bytes(bytes);
        let path = self.blob_path(&hash);

        if path.is_file() {
            self.touch(&hash, bytes.len() as u64);
            return Ok(hash);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
        std::fs::write(&tmp_path, bytes).map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        self.touch(&hash, bytes.len() as u64);
        if let Some(budget) = self.max_bytes {
            self.evict_to_budget(budget)?;
        }

        Ok(hash)
    }

    /// Verify a blob's bytes match its claimed hash without loading it
    /// fully into the caller's own buffer twice.
    pub fn verify(&self, hash: &Fingerprint) -> Result<bool> {
        let path = self.blob_path(hash);
        let bytes = std::fs::read(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        Ok(hash_bytes(&bytes) == *hash)
    }

    /// Remove a blob and its access record.
    pub fn remove(&self, hash: &Fingerprint) -> Result<()> {
        let path = self.blob_path(hash);
        if path.is_file() {
            std::fs::remove_file(&path).map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
        }
        self.index.remove(hash);
        Ok(())
    }

    /// Materialize a stored blob to `dest`, hardlinking when possible and
    /// falling back to a copy across filesystem boundaries (§4.G).
    pub fn materialize(&self, hash: &Fingerprint, dest: &Path) -> Result<()> {
        let src = self.blob_path(hash);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        if dest.exists() {
            std::fs::remove_file(dest).map_err(|source| Error::Io {
                path: dest.to_path_buf(),
                source,
            })?;
        }
        match std::fs::hard_link(&src, dest) {
            Ok(()) => Ok(()),
            Err(_) => std::fs::copy(&src, dest).map(|_| ()).map_err(|source| Error::Io {
                path: dest.to_path_buf(),
                source,
            }),
        }
    }

    fn touch(&self, hash: &Fingerprint, size: u64) {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.index.insert(*hash, AccessRecord { size, tick });
    }

    /// Size-weighted LRU: evict the least-recently-touched blobs until the
    /// store's total tracked size is at or below `budget`.
    fn evict_to_budget(&self, budget: u64) -> Result<()> {
        let total: u64 = self.index.iter().map(|e| e.size).sum();
        if total <= budget {
            return Ok(());
        }

        let mut entries: Vec<(Fingerprint, AccessRecord)> =
            self.index.iter().map(|e| (*e.key(), *e.value())).collect();
        entries.sort_by_key(|(_, record)| record.tick);

        let mut remaining = total;
        for (hash, record) in entries {
            if remaining <= budget {
                break;
            }
            self.remove(&hash)?;
            remaining = remaining.saturating_sub(record.size);
        }
        Ok(())
    }

    /// Flush the access-time index to disk. Best-effort: a lost index just
    /// degrades eviction ordering, it never loses blob data.
    pub fn persist_index(&self) -> Result<()> {
        let _guard = self.index_lock.lock().map_err(|_| {
            Error::Internal("store access-index lock poisoned".to_string())
        })?;

        let snapshot: Vec<(Fingerprint, AccessRecord)> =
            self.index.iter().map(|e| (*e.key(), *e.value())).collect();
        let bytes = postcard::to_allocvec(&snapshot)?;

        let tmp_path = self.index_path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes).map_err(|source| Error::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.index_path).map_err(|source| Error::Io {
            path: self.index_path.clone(),
            source,
        })?;
        Ok(())
    }
}

fn load_index(path: &Path) -> Option<DashMap<Fingerprint, AccessRecord>> {
    let bytes = std::fs::read(path).ok()?;
    let entries: Vec<(Fingerprint, AccessRecord)> = postcard::from_bytes(&bytes).ok()?;
    Some(entries.into_iter().collect())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
