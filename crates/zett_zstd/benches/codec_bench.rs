use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use zett_zstd::{Compressor, Decompressor};

fn synthetic_corpus(len: usize) -> Vec<u8> {
    let sentence: &[u8] = b"All happy families are alike; each unhappy family \
                            is unhappy in its own way. ";
    let mut data: Vec<u8> = sentence.iter().copied().cycle().take(len / 2).collect();

    let mut seed: u32 = 0x5EED;
    while data.len() < len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        data.push((seed >> 24) as u8);
        // keep runs of structure between the noise
        if seed % 13 == 0 {
            data.extend_from_slice(&sentence[..sentence.len().min(len - data.len())]);
        }
    }
    data.truncate(len);
    data
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    group.measurement_time(Duration::from_secs(7));

    for size in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024] {
        let input = synthetic_corpus(size);

        let mut compressed = vec![0u8; Compressor::max_compressed_length(input.len())];
        let compressed_size = Compressor::new()
            .compress(&input, &mut compressed)
            .expect("bench corpus compresses");
        compressed.truncate(compressed_size);

        group.throughput(Throughput::Bytes(input.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("compress", size),
            &input,
            |b, input| {
                let mut compressor = Compressor::new();
                let mut output = vec![0u8; Compressor::max_compressed_length(input.len())];
                b.iter(|| {
                    compressor
                        .compress(black_box(input), &mut output)
                        .expect("compression succeeds")
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("decompress", size),
            &compressed,
            |b, compressed| {
                let mut decompressor = Decompressor::new();
                let mut output = vec![0u8; input.len()];
                b.iter(|| {
                    let written = decompressor
                        .decompress(black_box(compressed), &mut output)
                        .expect("decompression succeeds");
                    assert_eq!(written, input.len());
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
