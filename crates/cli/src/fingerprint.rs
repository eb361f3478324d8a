// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Content and action fingerprinting (§4.A).
//!
//! Every cache lookup and CAS key in forge is a BLAKE3 hash. This module
//! centralizes the two hashing strategies used across the core:
//!
//! - file/byte hashing, with a memory-mapped fast path for large files
//! - metadata fast-path change detection, to skip re-hashing unchanged
//!   sources between incremental builds
//! - canonical action fingerprinting: a deterministic, length-prefixed
//!   serialization of an [`ActionSpec`]'s cache-relevant fields

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::action::ActionSpec;
use crate::error::{Error, Result};

/// Files at or above this size are memory-mapped instead of buffered.
pub const MMAP_THRESHOLD: u64 = 64 * 1024;

/// A BLAKE3 digest, newtyped so it can't be confused with an unrelated
/// `[u8; 32]` (a process exit code, a random nonce, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Parse a lowercase hex digest, as produced by [`Fingerprint::to_hex`].
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(s, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash a byte slice.
pub fn hash_bytes(data: &[u8]) -> Fingerprint {
    Fingerprint(*blake3::hash(data).as_bytes())
}

/// Hash a streaming reader without buffering the whole input in memory.
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<Fingerprint> {
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint(*hasher.finalize().as_bytes()))
}

/// Hash a file on disk, memory-mapping it when it clears [`MMAP_THRESHOLD`].
///
/// `unsafe` is confined to this one call site: mapping a file that another
/// process truncates concurrently is technically UB, a risk forge accepts
/// because inputs are expected to be stable for the duration of a build.
pub fn hash_file(path: &Path) -> Result<Fingerprint> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = file.metadata().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.len() >= MMAP_THRESHOLD {
        #[allow(unsafe_code)]
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(hash_bytes(&mmap))
    } else {
        hash_reader(file).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A cheap signature of file metadata used to short-circuit content hashing
/// for unchanged sources between incremental builds (§4.A, §4.K).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSignature {
    size: u64,
    mtime_secs: i64,
    mtime_nanos: u32,
    #[cfg(unix)]
    inode: u64,
}

impl MetadataSignature {
    pub fn read(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = metadata.modified().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let since_epoch = modified
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(Self {
                size: metadata.len(),
                mtime_secs: since_epoch.as_secs() as i64,
                mtime_nanos: since_epoch.subsec_nanos(),
                inode: metadata.ino(),
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {
                size: metadata.len(),
                mtime_secs: since_epoch.as_secs() as i64,
                mtime_nanos: since_epoch.subsec_nanos(),
            })
        }
    }
}

/// Compute the deterministic fingerprint of an action per §3's composite
/// key: sorted input hashes, command, sorted env, tool version, platform,
/// and the target's opaque config, each length-prefixed so no field can
/// bleed into its neighbor (`["ab", "c"]` must not fingerprint the same as
/// `["a", "bc"]`).
pub fn fingerprint_action(spec: &ActionSpec, input_hashes: &[Fingerprint]) -> Result<Fingerprint> {
    let mut sorted_hashes: Vec<&Fingerprint> = input_hashes.iter().collect();
    sorted_hashes.sort_by_key(|h| h.to_hex());

    let mut buf = Vec::new();
    write_prefixed(&mut buf, sorted_hashes.len().to_le_bytes().as_slice());
    for hash in &sorted_hashes {
        write_prefixed(&mut buf, hash.as_bytes());
    }

    write_prefixed(&mut buf, spec.command.len().to_le_bytes().as_slice());
    for arg in &spec.command {
        write_prefixed(&mut buf, arg.as_bytes());
    }

    // `env` is a BTreeMap, already key-sorted.
    write_prefixed(&mut buf, spec.env.len().to_le_bytes().as_slice());
    for (k, v) in &spec.env {
        write_prefixed(&mut buf, k.as_bytes());
        write_prefixed(&mut buf, v.as_bytes());
    }

    write_prefixed(&mut buf, spec.tool_version.as_bytes());
    write_prefixed(&mut buf, current_platform_tag().as_bytes());
    write_prefixed(&mut buf, spec.target.as_str().as_bytes());

    // `config` is a `BTreeMap`, so its JSON serialization is key-sorted and
    // therefore stable; two targets differing only in `config` must not
    // collide on the same fingerprint (spec.md:50).
    let config_bytes = serde_json::to_vec(&spec.config)
        .map_err(|e| Error::Internal(format!("failed to serialize action config: {e}")))?;
    write_prefixed(&mut buf, &config_bytes);

    Ok(hash_bytes(&buf))
}

fn write_prefixed(buf: &mut Vec<u8>, field: &[u8]) {
    buf.extend_from_slice(&(field.len() as u64).to_le_bytes());
    buf.extend_from_slice(field);
}

/// Platform tag folded into every action fingerprint so cached results from
/// one OS/arch combination are never reused on another.
pub fn current_platform_tag() -> &'static str {
    concat!(std::env::consts::OS, "-", std::env::consts::ARCH)
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
