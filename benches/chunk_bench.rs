//! Benchmarks for chunkdex.
//!
//! Run with:
//!     cargo bench

use std::hint::black_box;
use std::io::Cursor;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use chunkdex::{BufferPool, ChunkConfig, Chunker, Pipeline, PipelineConfig};

fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(0xC0FFEE).fill_bytes(&mut data);
    data
}

fn bench_chunker(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunker");
    let chunker = Chunker::new(ChunkConfig::new(16 * 1024, 64 * 1024, 256 * 1024).unwrap()).unwrap();

    for size in [1024 * 1024, 16 * 1024 * 1024] {
        let data = random_bytes(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(format!("random_{}mb", size / (1024 * 1024)), &data, |b, data| {
            b.iter(|| {
                let chunks = chunker.chunk_bytes(black_box(data.clone()));
                black_box(chunks.len())
            });
        });

        // All zeros: the digest never changes
        let zeros = vec![0u8; size];
        group.bench_with_input(format!("zeros_{}mb", size / (1024 * 1024)), &zeros, |b, data| {
            b.iter(|| {
                let chunks = chunker.chunk_bytes(black_box(data.clone()));
                black_box(chunks.len())
            });
        });
    }

    group.finish();
}

fn bench_configs(c: &mut Criterion) {
    let mut group = c.benchmark_group("configs");
    let size = 8 * 1024 * 1024;
    let data = random_bytes(size);
    group.throughput(Throughput::Bytes(size as u64));

    for (name, config) in [
        ("small_chunks", ChunkConfig::new(2 * 1024, 8 * 1024, 32 * 1024).unwrap()),
        ("medium_chunks", ChunkConfig::new(64 * 1024, 256 * 1024, 1024 * 1024).unwrap()),
        ("default_chunks", ChunkConfig::default()),
    ] {
        let chunker = Chunker::new(config).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                let chunks = chunker.chunk_bytes(black_box(data.clone()));
                black_box(chunks.len())
            });
        });
    }

    group.finish();
}

fn bench_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming");
    let size = 16 * 1024 * 1024;
    let data = random_bytes(size);
    let config = ChunkConfig::new(64 * 1024, 256 * 1024, 1024 * 1024).unwrap();
    let chunker = Chunker::new(config).unwrap();
    let pool = BufferPool::new(config.min_size(), 64);

    group.throughput(Throughput::Bytes(size as u64));
    group.bench_function("iterator", |b| {
        b.iter(|| {
            let mut count = 0;
            for chunk in chunker.chunk(Cursor::new(black_box(&data)), &pool) {
                let _ = chunk.unwrap();
                count += 1;
            }
            black_box(count)
        });
    });

    for workers in [1, 4] {
        let pipeline = Pipeline::new(config)
            .unwrap()
            .with_pool(pool.clone())
            .with_config(PipelineConfig::new(workers, workers * 2).unwrap());

        group.bench_function(format!("pipeline_{workers}_workers"), |b| {
            b.iter(|| {
                let file = pipeline.file_chunks(Cursor::new(black_box(&data))).unwrap();
                black_box(file.composite)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_chunker, bench_configs, bench_streaming);
criterion_main!(benches);
