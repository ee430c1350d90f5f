use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ts::test_support::{null_packet, pcr_packet, plain_packet};
use ts_output::{FRAME_SIZE, PcrCorrector, PcrMode};

fn frame_mixed(pcr: u64) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_SIZE);
    frame.extend_from_slice(&pcr_packet(0x101, pcr));
    frame.extend_from_slice(&plain_packet(0x101));
    frame.extend_from_slice(&plain_packet(0x102));
    frame.extend_from_slice(&null_packet());
    frame.extend_from_slice(&plain_packet(0x101));
    frame.extend_from_slice(&null_packet());
    frame.extend_from_slice(&plain_packet(0x102));
    frame
}

fn frame_padding_only() -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_SIZE);
    for _ in 0..7 {
        frame.extend_from_slice(&null_packet());
    }
    frame
}

fn benchmark_corrector(c: &mut Criterion) {
    let mut group = c.benchmark_group("PCR Correction");

    let mut corrector = PcrCorrector::new(PcrMode::Mode2, 4_000_000, false);
    let mut pcr = 1_000u64;
    let mut offset = 0u64;
    group.bench_function("Rewrite (1 PCR per frame)", |b| {
        b.iter(|| {
            pcr += 71_064;
            offset += FRAME_SIZE as u64;
            let mut frame = frame_mixed(pcr);
            corrector
                .process_frame(black_box(&mut frame), black_box(offset))
                .unwrap();
        })
    });

    let mut corrector = PcrCorrector::new(PcrMode::Mode0, 4_000_000, false);
    let mut pcr = 1_000u64;
    let mut offset = 0u64;
    group.bench_function("Passthrough (1 PCR per frame)", |b| {
        b.iter(|| {
            pcr += 71_064;
            offset += FRAME_SIZE as u64;
            let mut frame = frame_mixed(pcr);
            corrector
                .process_frame(black_box(&mut frame), black_box(offset))
                .unwrap();
        })
    });

    let mut corrector = PcrCorrector::new(PcrMode::Mode2, 4_000_000, false);
    group.bench_function("Padding only", |b| {
        b.iter(|| {
            let mut frame = frame_padding_only();
            corrector
                .process_frame(black_box(&mut frame), black_box(0))
                .unwrap();
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_corrector);
criterion_main!(benches);
