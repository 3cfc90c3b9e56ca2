//! Benchmarks for shard backends and the fan-out
//!
//! Run with: cargo bench --package shardstor-storage --bench storage

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shardstor_storage::backend::{AsyncWrapper, ShardClientSync};
use shardstor_storage::fanout::{FanoutOptions, ShardFanout, ShardTarget};
use shardstor_storage::memory::MemoryShard;
use shardstor_storage::sled_backend::SledShard;
use std::sync::Arc;
use tempfile::TempDir;

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark single store operations on the sled shard (latency)
fn bench_sled_store(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let shard = SledShard::open("sled://bench", temp_dir.path().join("shard")).unwrap();

    let mut group = c.benchmark_group("sled_store_latency");

    for size in [
        1024,            // 1 KB
        64 * 1024,       // 64 KB
        1024 * 1024,     // 1 MB (typical fragment)
    ] {
        let data = Bytes::from(generate_data(size));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("store", format_size(size)),
            &data,
            |b, data| {
                let mut counter = 0u64;
                b.iter(|| {
                    counter += 1;
                    shard
                        .store(&counter.to_le_bytes(), black_box(data.clone()))
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

/// Benchmark a 6-way fan-out write over memory shards
fn bench_fanout_write(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let targets: Vec<ShardTarget> = (0..6)
        .map(|i| {
            let shard = MemoryShard::new(format!("memory://bench{}", i));
            ShardTarget::new(Arc::new(AsyncWrapper(shard)))
        })
        .collect();
    let fanout = ShardFanout::new(targets, FanoutOptions::default());

    let fragment = Bytes::from(generate_data(1024 * 1024));
    let values: Vec<Bytes> = (0..6).map(|_| fragment.clone()).collect();
    let keys: Vec<Vec<u8>> = (0..6).map(|i| format!("bench.{}", i).into_bytes()).collect();

    let mut group = c.benchmark_group("fanout_write");
    group.throughput(Throughput::Bytes(6 * fragment.len() as u64));
    group.bench_function("6x1MB", |b| {
        b.iter(|| runtime.block_on(fanout.write(black_box(&keys), black_box(&values))))
    });
    group.finish();
}

/// Format size for display
fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{}MB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{}B", bytes)
    }
}

criterion_group!(benches, bench_sled_store, bench_fanout_write);
criterion_main!(benches);
