use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gige_exposure::artifact::ChecksumAlgorithm;
use gige_exposure::device::FrameGeometry;
use gige_exposure::readout::{decode_mono8, PixelStatistics};

// Full Manta G-125B frame.
const WIDTH: u32 = 1292;
const HEIGHT: u32 = 964;

fn full_frame() -> Vec<u8> {
    (0..WIDTH as usize * HEIGHT as usize)
        .map(|i| (i % 251) as u8)
        .collect()
}

fn bench_readout(c: &mut Criterion) {
    let raw = full_frame();
    let geometry = FrameGeometry::new(WIDTH, HEIGHT, 8);

    c.bench_function("decode full frame", |b| {
        b.iter(|| decode_mono8(black_box(&raw), geometry))
    });

    let grid = decode_mono8(&raw, geometry).expect("frame decodes");
    c.bench_function("statistics full frame", |b| {
        b.iter(|| PixelStatistics::analyze(black_box(&grid)))
    });

    c.bench_function("blake3 full frame", |b| {
        b.iter(|| ChecksumAlgorithm::Blake3.digest(black_box(&raw)))
    });
}

criterion_group!(benches, bench_readout);
criterion_main!(benches);
