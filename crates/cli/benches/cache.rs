// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Action cache and content store benchmarks (§4.B, §4.C).
//!
//! Measures blob store put/get throughput and action-cache lookup/insert
//! cost under a populated index, the two operations that sit on every
//! build's hot path regardless of cache hit rate.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tempfile::TempDir;

use forge::cache::{ActionCache, CacheEntry, CacheMetadata};
use forge::fingerprint::hash_bytes;
use forge::store::Store;

const TOOL_VERSION: &str = "bench-tool";

fn bench_store_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_put");

    for size in [1024usize, 64 * 1024, 1024 * 1024] {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), None).unwrap();
        let data = vec![0x11u8; size];

        group.throughput(criterion::Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            // Each iteration's content differs only in a counter suffix so
            // every put is a genuine new blob, not a dedup no-op.
            let mut counter = 0u64;
            b.iter(|| {
                counter += 1;
                let mut payload = data.clone();
                payload.extend_from_slice(&counter.to_le_bytes());
                black_box(store.put(&payload).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_store_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path(), None).unwrap();
    let hash = store.put(b"benchmark payload, read repeatedly").unwrap();

    c.bench_function("store_get/cached_blob", |b| {
        b.iter(|| black_box(store.get(&hash).unwrap()))
    });
}

fn populated_cache(entry_count: usize) -> (TempDir, ActionCache, Vec<forge::fingerprint::Fingerprint>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Store::open(dir.path().join("objects"), None).unwrap());
    let cache = ActionCache::open(dir.path().join("actions"), store, None).unwrap();

    let fingerprints: Vec<_> = (0..entry_count)
        .map(|i| {
            let fp = hash_bytes(format!("action-{i}").as_bytes());
            let hash = cache
                .store()
                .put(format!("output-{i}").as_bytes())
                .unwrap();
            cache.insert(
                fp,
                CacheEntry::new(
                    vec![(std::path::PathBuf::from(format!("out/{i}.bin")), hash)],
                    0,
                    CacheMetadata::current(TOOL_VERSION),
                ),
            );
            fp
        })
        .collect();

    (dir, cache, fingerprints)
}

fn bench_cache_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_lookup");

    for entry_count in [16usize, 1024, 16384] {
        let (_dir, cache, fingerprints) = populated_cache(entry_count);
        let probe = fingerprints[entry_count / 2];

        group.bench_with_input(
            BenchmarkId::from_parameter(entry_count),
            &probe,
            |b, probe| b.iter(|| black_box(cache.lookup(probe, TOOL_VERSION).unwrap())),
        );
    }

    group.finish();
}

fn bench_cache_insert(c: &mut Criterion) {
    let (_dir, cache, _fingerprints) = populated_cache(1024);

    c.bench_function("cache_insert/new_fingerprint", |b| {
        let mut counter = 0u64;
        b.iter(|| {
            counter += 1;
            let fp = hash_bytes(format!("fresh-action-{counter}").as_bytes());
            cache.insert(
                fp,
                CacheEntry::new(Vec::new(), 0, CacheMetadata::current(TOOL_VERSION)),
            );
        })
    });
}

criterion_group!(
    benches,
    bench_store_put,
    bench_store_get,
    bench_cache_lookup,
    bench_cache_insert
);
criterion_main!(benches);
