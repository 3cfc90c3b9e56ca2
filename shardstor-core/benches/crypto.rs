//! Benchmarks for hashing, encryption and compression
//!
//! Run with: cargo bench --package shardstor-core --bench crypto

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shardstor_core::compress::{CompressionLevel, Compressor};
use shardstor_core::crypto::{EncryptionKey, Encrypter, HashAlgorithm, Hasher};

/// Generate test data of specified size
fn generate_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Benchmark every hash algorithm at various sizes
fn bench_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash");

    for algorithm in [HashAlgorithm::Blake2b, HashAlgorithm::Sha256, HashAlgorithm::Md5] {
        let hasher = Hasher::new(algorithm);
        for size in [
            1024,                  // 1 KB
            1024 * 1024,           // 1 MB
            4 * 1024 * 1024,       // 4 MB (default chunk size)
        ] {
            let data = generate_data(size);

            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(algorithm.as_str(), format_size(size)),
                &data,
                |b, data| b.iter(|| hasher.hash(black_box(data))),
            );
        }
    }

    group.finish();
}

/// Benchmark AES-256-GCM encryption
fn bench_aes_encrypt(c: &mut Criterion) {
    let encrypter = Encrypter::new(&EncryptionKey::generate());

    let mut group = c.benchmark_group("aes_gcm_encrypt");

    for size in [
        1024,                  // 1 KB
        64 * 1024,             // 64 KB
        1024 * 1024,           // 1 MB
        4 * 1024 * 1024,       // 4 MB
    ] {
        let data = generate_data(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("encrypt", format_size(size)),
            &data,
            |b, data| b.iter(|| encrypter.encrypt(black_box(data))),
        );
    }

    group.finish();
}

/// Benchmark AES-256-GCM decryption
fn bench_aes_decrypt(c: &mut Criterion) {
    let encrypter = Encrypter::new(&EncryptionKey::generate());

    let mut group = c.benchmark_group("aes_gcm_decrypt");

    for size in [1024, 1024 * 1024, 4 * 1024 * 1024] {
        let sealed = encrypter.encrypt(&generate_data(size)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("decrypt", format_size(size)),
            &sealed,
            |b, sealed| b.iter(|| encrypter.decrypt(black_box(sealed))),
        );
    }

    group.finish();
}

/// Benchmark compression on a 4 MB chunk
fn bench_compress(c: &mut Criterion) {
    let data = generate_data(4 * 1024 * 1024);

    let mut group = c.benchmark_group("compress_4MB");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (name, compressor) in [
        ("snappy", Compressor::snappy()),
        ("gzip-best-speed", Compressor::gzip(CompressionLevel::BestSpeed)),
        ("gzip-default", Compressor::gzip(CompressionLevel::Default)),
    ] {
        group.bench_function(name, |b| b.iter(|| compressor.compress(black_box(&data))));
    }

    group.finish();
}

/// Benchmark key generation
fn bench_key_generation(c: &mut Criterion) {
    c.bench_function("key_generate", |b| b.iter(EncryptionKey::generate));
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

criterion_group!(
    benches,
    bench_hash,
    bench_aes_encrypt,
    bench_aes_decrypt,
    bench_compress,
    bench_key_generation,
);
criterion_main!(benches);
