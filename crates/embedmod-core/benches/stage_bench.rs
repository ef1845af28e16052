//! # Staging Benchmarks
//!
//! Cost of hashing, cache-hit staging, and cache-miss staging.
//!
//! Run with: `cargo bench -p embedmod-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use embedmod_core::{ContentStager, content_hash};
use std::hint::black_box;

fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");

    for size in [4 * 1024, 256 * 1024, 4 * 1024 * 1024].iter() {
        let bytes = payload(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(content_hash(bytes)));
        });
    }

    group.finish();
}

fn bench_stage_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage_reuse");
    let dir = tempfile::tempdir().expect("tempdir");
    let stager = ContentStager::new(dir.path());

    for size in [4 * 1024, 256 * 1024, 4 * 1024 * 1024].iter() {
        let bytes = payload(*size);
        let name = format!("reuse-{}.bin", size);
        stager.stage(&bytes, &name).expect("prime");

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(stager.stage(bytes, &name).expect("stage")));
        });
    }

    group.finish();
}

fn bench_stage_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("stage_rewrite");
    let dir = tempfile::tempdir().expect("tempdir");
    let stager = ContentStager::new(dir.path());

    for size in [4 * 1024, 256 * 1024].iter() {
        let a = payload(*size);
        let mut b_bytes = a.clone();
        b_bytes[0] ^= 0xFF;
        let name = format!("rewrite-{}.bin", size);
        let mut flip = false;

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                flip = !flip;
                let bytes = if flip { &a } else { &b_bytes };
                black_box(stager.stage(bytes, &name).expect("stage"))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_content_hash,
    bench_stage_reuse,
    bench_stage_rewrite
);
criterion_main!(benches);
