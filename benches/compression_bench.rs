use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hpclog::codec::{new_decoder, new_encoder, CompressionType, StreamDecoder, StreamEncoder};

fn round_trip(kind: CompressionType, data: &[u8]) -> Vec<u8> {
    let mut enc = new_encoder(kind);
    let mut compressed = vec![0u8; data.len() + 4096];
    let mut pos = 0;
    let mut consumed = 0;
    while consumed < data.len() {
        consumed += enc.encode(&data[consumed..], &mut compressed, &mut pos).unwrap();
    }
    while !enc.finish(&mut compressed, &mut pos).unwrap() {
        compressed.resize(compressed.len() + 4096, 0);
    }
    compressed.truncate(pos);

    let mut dec = new_decoder(kind);
    let mut out = vec![0u8; data.len()];
    let mut out_pos = 0;
    dec.decode(&compressed, &mut out, &mut out_pos).unwrap();
    out
}

fn bench_compression(c: &mut Criterion) {
    let data = vec![0u8; 1024 * 1024];
    c.bench_function("deflate_round_trip_1mb", |b| {
        b.iter(|| round_trip(CompressionType::Deflate, black_box(&data)))
    });
    c.bench_function("bzip2_round_trip_1mb", |b| {
        b.iter(|| round_trip(CompressionType::Bzip2, black_box(&data)))
    });
}

criterion_group!(benches, bench_compression);
criterion_main!(benches);
