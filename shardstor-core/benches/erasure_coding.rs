//! Benchmarks for Reed-Solomon erasure coding
//!
//! Run with: cargo bench --package shardstor-core --bench erasure_coding

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shardstor_core::erasure::ErasureCodec;

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark encoding at various data sizes
fn bench_encode(c: &mut Criterion) {
    let codec = ErasureCodec::new(10, 4).unwrap();

    let mut group = c.benchmark_group("erasure_encode");

    for size in [
        1024 * 1024,           // 1 MB
        4 * 1024 * 1024,       // 4 MB
        16 * 1024 * 1024,      // 16 MB
    ] {
        let data = generate_data(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("10+4", format!("{}MB", size / (1024 * 1024))),
            &data,
            |b, data| b.iter(|| codec.encode(black_box(data))),
        );
    }

    group.finish();
}

/// Compare codec shapes on a 4 MB chunk
fn bench_encode_shapes(c: &mut Criterion) {
    let data = generate_data(4 * 1024 * 1024);

    let mut group = c.benchmark_group("erasure_encode_shapes_4MB");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (k, m) in [(4, 2), (10, 4), (16, 0)] {
        let codec = ErasureCodec::new(k, m).unwrap();
        group.bench_function(format!("{}+{}", k, m), |b| {
            b.iter(|| codec.encode(black_box(&data)))
        });
    }

    group.finish();
}

/// Benchmark decoding with various numbers of lost fragments
fn bench_decode(c: &mut Criterion) {
    let codec = ErasureCodec::new(10, 4).unwrap();
    let data = generate_data(10 * 1024 * 1024); // 10 MB
    let original_size = data.len();

    let fragments: Vec<Bytes> = codec
        .encode(&data)
        .unwrap()
        .into_iter()
        .map(|f| f.data)
        .collect();

    let mut group = c.benchmark_group("erasure_decode");
    group.throughput(Throughput::Bytes(original_size as u64));

    for lost in [vec![], vec![0, 7], vec![0, 3, 10, 13]] {
        let mut slots = fragments.clone();
        for &i in &lost {
            slots[i] = Bytes::new();
        }
        group.bench_function(format!("{}_lost", lost.len()), |b| {
            b.iter(|| codec.decode(black_box(&slots), &lost, original_size))
        });
    }

    group.finish();
}

/// Benchmark fragment verification
fn bench_verify(c: &mut Criterion) {
    let codec = ErasureCodec::new(10, 4).unwrap();
    let data = generate_data(10 * 1024 * 1024); // 10 MB
    let fragments = codec.encode(&data).unwrap();

    c.bench_function("verify_fragments_10MB", |b| {
        b.iter(|| codec.verify(black_box(&fragments)))
    });
}

criterion_group!(benches, bench_encode, bench_encode_shapes, bench_decode, bench_verify);
criterion_main!(benches);
