//! Compressor benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dbflat_bench::{random_data, run_data, text_data};
use dbflat_codec::{CompressorRegistry, COMP_HUFFMAN, COMP_RLE, COMP_ZSTD};

const CODECS: [(&str, u8); 3] = [("rle", COMP_RLE), ("huffman", COMP_HUFFMAN), ("zstd", COMP_ZSTD)];

fn inputs(size: usize) -> [(&'static str, Vec<u8>); 3] {
    [
        ("random", random_data(size)),
        ("text", text_data(size)),
        ("runs", run_data(size)),
    ]
}

/// Benchmark compression.
fn bench_compress(c: &mut Criterion) {
    let mut group = c.benchmark_group("compress");
    let registry = CompressorRegistry::with_builtins();

    for (input_name, input) in inputs(4096) {
        group.throughput(Throughput::Bytes(input.len() as u64));
        for (codec, id) in CODECS {
            group.bench_with_input(BenchmarkId::new(codec, input_name), &input, |b, input| {
                let mut out = Vec::with_capacity(input.len());
                b.iter(|| {
                    out.clear();
                    registry.compress_into(id, black_box(input), &mut out).unwrap();
                    black_box(out.len());
                });
            });
        }
    }

    group.finish();
}

/// Benchmark decompression.
fn bench_decompress(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress");
    let registry = CompressorRegistry::with_builtins();

    for (input_name, input) in inputs(4096) {
        group.throughput(Throughput::Bytes(input.len() as u64));
        for (codec, id) in CODECS {
            let mut blob = Vec::new();
            registry.compress_into(id, &input, &mut blob).unwrap();
            group.bench_with_input(BenchmarkId::new(codec, input_name), &blob, |b, blob| {
                let mut out = Vec::with_capacity(input.len());
                b.iter(|| {
                    out.clear();
                    registry
                        .decompress_into(id, black_box(blob), Some(input.len()), &mut out)
                        .unwrap();
                    black_box(out.len());
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);

criterion_main!(benches);
