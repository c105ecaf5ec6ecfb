use std::hint::black_box;
use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion};

use arcsift::record::Record;
use arcsift::ChunkDecoder;

/// Synthetic comment archive, one JSON object per line.
fn synthetic_payload(lines: usize) -> Vec<u8> {
    let mut payload = Vec::new();
    for i in 0..lines {
        payload.extend_from_slice(
            format!(
                "{{\"id\":\"c{}\",\"subreddit\":\"sub{}\",\"body\":\"some comment text with a bit of padding, entry {}\"}}\n",
                i,
                i % 50,
                i
            )
            .as_bytes(),
        );
    }
    payload
}

fn decode_all(payload: &[u8], chunk_size: usize) -> u64 {
    let decoder = ChunkDecoder::with_chunk_size(Cursor::new(payload), chunk_size);
    let mut lines = 0u64;
    for line in decoder {
        black_box(line.unwrap());
        lines += 1;
    }
    lines
}

fn bench_decode_default_chunk(c: &mut Criterion) {
    let payload = synthetic_payload(10_000);
    c.bench_function("decode_default_chunk", |b| {
        b.iter(|| {
            black_box(decode_all(black_box(&payload), 4 * 1024 * 1024));
        });
    });
}

fn bench_decode_64k_chunk(c: &mut Criterion) {
    let payload = synthetic_payload(10_000);
    c.bench_function("decode_64k_chunk", |b| {
        b.iter(|| {
            black_box(decode_all(black_box(&payload), 64 * 1024));
        });
    });
}

fn bench_decode_4k_chunk(c: &mut Criterion) {
    let payload = synthetic_payload(10_000);
    c.bench_function("decode_4k_chunk", |b| {
        b.iter(|| {
            black_box(decode_all(black_box(&payload), 4 * 1024));
        });
    });
}

fn bench_decode_strict(c: &mut Criterion) {
    let payload = synthetic_payload(10_000);
    c.bench_function("decode_strict", |b| {
        b.iter(|| {
            let decoder =
                ChunkDecoder::with_chunk_size(Cursor::new(black_box(&payload)), 64 * 1024)
                    .strict(true);
            for line in decoder {
                black_box(line.unwrap());
            }
        });
    });
}

fn bench_decode_and_parse(c: &mut Criterion) {
    let payload = synthetic_payload(10_000);
    c.bench_function("decode_and_parse", |b| {
        b.iter(|| {
            let decoder = ChunkDecoder::with_chunk_size(Cursor::new(black_box(&payload)), 64 * 1024);
            for line in decoder {
                black_box(Record::parse(&line.unwrap()).unwrap());
            }
        });
    });
}

criterion_group!(
    chunk_decoder_benches,
    bench_decode_default_chunk,
    bench_decode_64k_chunk,
    bench_decode_4k_chunk,
    bench_decode_strict,
    bench_decode_and_parse
);
criterion_main!(chunk_decoder_benches);
