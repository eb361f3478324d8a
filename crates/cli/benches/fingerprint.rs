// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Forge Contributors

//! Fingerprinting benchmarks (§4.A).
//!
//! Measures the cost of the two hashing paths forge leans on most heavily:
//! raw content hashing (buffered vs. memory-mapped) and the canonical,
//! length-prefixed action fingerprint that every cache lookup keys on.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tempfile::NamedTempFile;

use forge::action::ActionSpec;
use forge::fingerprint::{fingerprint_action, hash_bytes, hash_file};
use forge::graph::TargetId;

fn bench_hash_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_bytes");

    for size in [1024usize, 64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let data = vec![0x5au8; size];
        group.throughput(criterion::Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(hash_bytes(data)))
        });
    }

    group.finish();
}

/// `hash_file` picks the mmap path above [`forge::fingerprint::MMAP_THRESHOLD`];
/// bench both sides of that boundary.
fn bench_hash_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_file");

    for size in [4 * 1024usize, 128 * 1024, 4 * 1024 * 1024] {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![0x7eu8; size]).unwrap();
        file.flush().unwrap();

        group.throughput(criterion::Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), file.path(), |b, path| {
            b.iter(|| black_box(hash_file(path).unwrap()))
        });
    }

    group.finish();
}

fn sample_action(input_count: usize) -> (ActionSpec, Vec<forge::fingerprint::Fingerprint>) {
    let mut env = BTreeMap::new();
    env.insert("RUSTFLAGS".to_string(), "-C opt-level=3".to_string());
    env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());

    let spec = ActionSpec {
        target: TargetId::new("//services/api:server"),
        command: vec![
            "rustc".to_string(),
            "--crate-type".to_string(),
            "bin".to_string(),
            "src/main.rs".to_string(),
        ],
        env,
        env_allowlist: vec!["HOME".to_string()],
        inputs: Vec::new(),
        outputs: Vec::new(),
        working_dir: std::path::PathBuf::from("/workspace"),
        limits: Default::default(),
        network: Default::default(),
        timeout: Duration::from_secs(600),
        tool_version: "rustc 1.82.0".to_string(),
    };

    let hashes = (0..input_count)
        .map(|i| hash_bytes(format!("input-{i}").as_bytes()))
        .collect();

    (spec, hashes)
}

fn bench_fingerprint_action(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint_action");

    for input_count in [1usize, 16, 256] {
        let (spec, hashes) = sample_action(input_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(input_count),
            &(spec, hashes),
            |b, (spec, hashes)| b.iter(|| black_box(fingerprint_action(spec, hashes).unwrap())),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_hash_bytes,
    bench_hash_file,
    bench_fingerprint_action
);
criterion_main!(benches);
