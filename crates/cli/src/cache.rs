// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Multi-tier action cache (§4.C).
//!
//! A [`CacheEntry`] maps an action fingerprint to the hashes of the outputs
//! it produced. Lookups check the local tier first (a `DashMap` index
//! backed by the on-disk [`Store`]), then fall through to an optional
//! remote tier. A remote hit is written through to the local tier so later
//! lookups for the same fingerprint never cross the network again.
//!
//! ## Cache format history
//! v1: initial local-tier-only format.
//! v2: added remote write-through stats and per-entry output manifests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::remote::RemoteCache;
use crate::store::Store;

/// On-disk index format version. Bump and extend [`CacheIndex::migrate`]
/// when the entry schema changes incompatibly.
pub const CACHE_VERSION: u32 = 3;

pub const INDEX_FILE_NAME: &str = "action-index.postcard";

/// Recorded invocation context an entry was produced under (spec.md:64).
/// Checked against the current invocation on lookup: a toolchain upgrade
/// or a platform change must not honor a stale hit even if the fingerprint
/// still matches by coincidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub tool_version: String,
    pub platform: String,
}

impl CacheMetadata {
    pub fn current(tool_version: impl Into<String>) -> Self {
        Self {
            tool_version: tool_version.into(),
            platform: fingerprint::current_platform_tag().to_string(),
        }
    }

    fn matches(&self, tool_version: &str) -> bool {
        self.tool_version == tool_version && self.platform == fingerprint::current_platform_tag()
    }
}

/// A single cached action result: the set of output blob hashes produced
/// by running an action with a given fingerprint, keyed by their declared
/// output path so materialization can restore them by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub outputs: Vec<(PathBuf, Fingerprint)>,
    pub exit_code: i32,
    pub metadata: CacheMetadata,
    /// Hash of `(outputs, exit_code, metadata)`, recomputed by
    /// [`ActionCache::validate`] to detect a tampered or bit-rotted index
    /// record independently of whether its blobs still exist in the store.
    pub validation_hash: Fingerprint,
    pub timestamp_secs: u64,
}

impl CacheEntry {
    /// Build a new entry, stamping it with the current time and computing
    /// its validation hash from the fields supplied.
    pub fn new(outputs: Vec<(PathBuf, Fingerprint)>, exit_code: i32, metadata: CacheMetadata) -> Self {
        let validation_hash = Self::compute_validation_hash(&outputs, exit_code, &metadata);
        Self {
            outputs,
            exit_code,
            metadata,
            validation_hash,
            timestamp_secs: now_secs(),
        }
    }

    fn compute_validation_hash(
        outputs: &[(PathBuf, Fingerprint)],
        exit_code: i32,
        metadata: &CacheMetadata,
    ) -> Fingerprint {
        let mut buf = Vec::new();
        for (path, hash) in outputs {
            buf.extend_from_slice(path.to_string_lossy().as_bytes());
            buf.extend_from_slice(hash.as_bytes());
        }
        buf.extend_from_slice(&exit_code.to_le_bytes());
        buf.extend_from_slice(metadata.tool_version.as_bytes());
        buf.extend_from_slice(metadata.platform.as_bytes());
        fingerprint::hash_bytes(&buf)
    }

    /// Whether the recorded `validation_hash` still matches the entry's own
    /// fields — independent of whether its blobs still exist in the store.
    fn fields_intact(&self) -> bool {
        Self::compute_validation_hash(&self.outputs, self.exit_code, &self.metadata) == self.validation_hash
    }

    /// How long ago this entry was inserted.
    pub fn age(&self) -> Duration {
        Duration::from_secs(now_secs().saturating_sub(self.timestamp_secs))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    entries: Vec<(Fingerprint, CacheEntry)>,
}

/// Where a cache hit was resolved from; carried into build telemetry and
/// the final certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Remote,
}

/// Lookup outcome.
pub enum CacheResult {
    Hit(CacheEntry, CacheTier),
    Miss,
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub local_hits: AtomicU64,
    pub remote_hits: AtomicU64,
    pub misses: AtomicU64,
    pub inserts: AtomicU64,
}

/// Default maximum cache entry age when a workspace never configures one.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 86_400);

/// The action cache: a local index plus an optional remote tier.
pub struct ActionCache {
    index: DashMap<Fingerprint, CacheEntry>,
    index_path: PathBuf,
    persist_lock: Mutex<()>,
    store: std::sync::Arc<Store>,
    remote: Option<RemoteCache>,
    max_age: Duration,
    pub stats: CacheStats,
}

impl ActionCache {
    pub fn open(
        cache_dir: impl Into<PathBuf>,
        store: std::sync::Arc<Store>,
        remote: Option<RemoteCache>,
    ) -> Result<Self> {
        Self::open_with_max_age(cache_dir, store, remote, DEFAULT_MAX_AGE)
    }

    pub fn open_with_max_age(
        cache_dir: impl Into<PathBuf>,
        store: std::sync::Arc<Store>,
        remote: Option<RemoteCache>,
        max_age: Duration,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir).map_err(|source| Error::Io {
            path: cache_dir.clone(),
            source,
        })?;
        let index_path = cache_dir.join(INDEX_FILE_NAME);
        let index = load_index(&index_path)?;

        Ok(Self {
            index,
            index_path,
            persist_lock: Mutex::new(()),
            store,
            remote,
            max_age,
            stats: CacheStats::default(),
        })
    }

    /// §4.C's `validate(entry) -> bool`: an entry may only be honored as a
    /// hit if its own fields weren't tampered with or bit-rotted, every
    /// declared output blob is still present in the content store, and it
    /// isn't older than the configured maximum age.
    pub fn validate(&self, entry: &CacheEntry) -> bool {
        entry.fields_intact()
            && entry.age() <= self.max_age
            && entry.outputs.iter().all(|(_, hash)| self.store.has(hash))
    }

    /// Resolve a fingerprint: local tier, then remote tier if configured.
    /// A remote hit is written through to the local index before returning.
    /// `tool_version` is the current invocation's tool identity, checked
    /// against the entry's recorded metadata so a toolchain upgrade can
    /// never reuse a hit produced under a different compiler (§4.C).
    pub fn lookup(&self, fingerprint: &Fingerprint, tool_version: &str) -> Result<CacheResult> {
        if let Some(entry) = self.index.get(fingerprint) {
            if self.validate(&entry) && entry.metadata.matches(tool_version) {
                self.stats.local_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(CacheResult::Hit(entry.clone(), CacheTier::Local));
            }
            // Present but expired, tampered, or produced under a different
            // toolchain/platform: drop it and fall through to a real miss.
            drop(entry);
            self.index.remove(fingerprint);
        }

        if let Some(remote) = &self.remote {
            // A remote-tier error (network failure, rate-limit budget
            // exhausted) is never fatal to the lookup: the caller falls
            // through to a local miss and rebuilds, same as if the remote
            // tier were unconfigured (§4.C resolution policy).
            match remote.fetch_entry(fingerprint) {
                Ok(Some(entry)) if self.validate(&entry) && entry.metadata.matches(tool_version) => {
                    self.stats.remote_hits.fetch_add(1, Ordering::Relaxed);
                    self.index.insert(*fingerprint, entry.clone());
                    return Ok(CacheResult::Hit(entry, CacheTier::Remote));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "remote cache lookup failed, treating as miss");
                }
            }
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(CacheResult::Miss)
    }

    /// Insert a freshly-computed result into the local tier, and best-effort
    /// push it to the remote tier if configured. A remote push failure never
    /// fails the build — it only means the next invocation re-executes.
    pub fn insert(&self, fingerprint: Fingerprint, entry: CacheEntry) {
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        self.index.insert(fingerprint, entry.clone());

        if let Some(remote) = &self.remote {
            if let Err(err) = remote.push_entry(&fingerprint, &entry) {
                tracing::warn!(error = %err, "remote cache push failed, continuing locally");
            }
        }
    }

    /// Drop a stale or corrupted entry from the local tier.
    pub fn invalidate(&self, fingerprint: &Fingerprint) {
        self.index.remove(fingerprint);
    }

    /// Persist the local index to disk. Called at the end of a build.
    pub fn persist(&self) -> Result<()> {
        let _guard = self
            .persist_lock
            .lock()
            .map_err(|_| Error::Internal("cache index lock poisoned".to_string()))?;

        let entries: Vec<(Fingerprint, CacheEntry)> =
            self.index.iter().map(|e| (*e.key(), e.value().clone())).collect();
        let persisted = PersistedIndex {
            version: CACHE_VERSION,
            entries,
        };
        let bytes = postcard::to_allocvec(&persisted)?;

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

    /// Spawn a background thread that persists the index without blocking
    /// the caller, mirroring how the rest of the build pipeline treats
    /// index writes as best-effort housekeeping rather than a hot path.
    pub fn persist_async(self: std::sync::Arc<Self>) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            if let Err(err) = self.persist() {
                tracing::warn!(error = %err, "failed to persist action cache index");
            }
        })
    }

    pub fn store(&self) -> &std::sync::Arc<Store> {
        &self.store
    }
}

fn load_index(path: &std::path::Path) -> Result<DashMap<Fingerprint, CacheEntry>> {
    let Ok(bytes) = std::fs::read(path) else {
        return Ok(DashMap::new());
    };

    let persisted: PersistedIndex = match postcard::from_bytes(&bytes) {
        Ok(p) => p,
        Err(_) => return Ok(DashMap::new()),
    };

    if persisted.version != CACHE_VERSION {
        tracing::info!(
            found = persisted.version,
            expected = CACHE_VERSION,
            "action cache format changed, starting cold"
        );
        return Ok(DashMap::new());
    }

    Ok(persisted.entries.into_iter().collect())
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
