use std::io::Cursor;

use criterion::{
    BenchmarkId,
    criterion_group,
    criterion_main,
    Criterion,
    Throughput,
};

use bevy_splat_compare::{
    gaussian::textures::PackedTextures,
    io::{
        codec::SplatCodec,
        splat::SPLAT_RECORD_SIZE,
    },
    random_splats,
    stream::ChunkStreamDecoder,
    SplatRecord,
};


const SPLAT_COUNTS: [usize; 3] = [
    1000,
    84_348,
    1_000_000,
];

fn splat_decode_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode splat records");
    for count in SPLAT_COUNTS.iter() {
        group.throughput(Throughput::Bytes(*count as u64 * SPLAT_RECORD_SIZE as u64));
        group.bench_with_input(
            BenchmarkId::new("decode", count),
            &count,
            |b, &count| {
                let bytes = random_splats(*count).encode();

                b.iter(|| Vec::<SplatRecord>::decode(bytes.as_slice()));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("stream_and_pack", count),
            &count,
            |b, &count| {
                let bytes = random_splats(*count).encode();

                b.iter(|| {
                    let mut decoder = ChunkStreamDecoder::new(25_000, Some(*count));
                    let mut reader = Cursor::new(bytes.as_slice());
                    let mut textures = PackedTextures::with_capacity(*count);

                    while let Ok(Some(batch)) = decoder.next_batch(&mut reader) {
                        let _ = textures.write_or_grow(batch.start, &batch.records);
                    }

                    textures
                });
            },
        );
    }
}

criterion_group!{
    name = io_benches;
    config = Criterion::default().sample_size(10);
    targets = splat_decode_benchmark
}
criterion_main!(io_benches);
