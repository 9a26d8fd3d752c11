use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seek_thermal_rs::thermal::frame::{FRAME_HEIGHT, FRAME_KIND_PIXEL, FRAME_WIDTH, PIXEL_COUNT};
use seek_thermal_rs::thermal::protocol::{decode_raw_frame, RAW_ROW_STRIDE};
use seek_thermal_rs::thermal::{CalibrationCoordinator, EventDispatcher, ThermalFrame};
use std::sync::Arc;

fn generate_mock_pixels(kind: u16) -> Vec<u16> {
    let mut pixels: Vec<u16> = (0..PIXEL_COUNT)
        .map(|i| 6000 + ((i % FRAME_WIDTH) + (i / FRAME_WIDTH)) as u16 * 3)
        .collect();
    pixels[FRAME_KIND_PIXEL] = kind;
    pixels
}

fn generate_mock_raw_frame() -> Vec<u8> {
    let pixels = generate_mock_pixels(3);
    let mut raw = Vec::new();
    for y in 0..FRAME_HEIGHT {
        for x in 0..RAW_ROW_STRIDE {
            let value = if x < FRAME_WIDTH { pixels[y * FRAME_WIDTH + x] } else { 0 };
            raw.extend_from_slice(&value.to_le_bytes());
        }
    }
    raw
}

fn benchmark_decode(c: &mut Criterion) {
    let raw = generate_mock_raw_frame();

    c.bench_function("decode_raw_frame", |b| {
        b.iter(|| decode_raw_frame(black_box(&raw)))
    });
}

fn benchmark_frame_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_operations");
    let frame = ThermalFrame::from_pixels(generate_mock_pixels(3)).unwrap();
    let gain = frame.gain_calibration();
    let offset = frame.offset_calibration();

    group.bench_function("compute_min_max", |b| {
        let mut frame = frame.clone();
        b.iter(|| frame.compute_min_max());
    });

    group.bench_function("apply_gain_offset", |b| {
        b.iter(|| {
            let mut frame = frame.clone();
            let _ = frame.apply_gain_calibration(black_box(&gain));
            let _ = frame.apply_offset_calibration(black_box(&offset));
        });
    });

    group.finish();
}

fn benchmark_fix_bad_pixels(c: &mut Criterion) {
    let mut group = c.benchmark_group("fix_bad_pixels");
    let frame = ThermalFrame::from_pixels(generate_mock_pixels(3)).unwrap();

    for extra in [0usize, 100, 1000] {
        let indices: Vec<usize> = (0..extra).map(|i| (i * 31) % PIXEL_COUNT).collect();

        group.bench_with_input(BenchmarkId::from_parameter(extra), &indices, |b, indices| {
            b.iter(|| {
                let mut frame = frame.clone();
                frame.add_bad_pixels(black_box(indices));
                frame.fix_bad_pixels();
            });
        });
    }

    group.finish();
}

fn benchmark_regular_frame(c: &mut Criterion) {
    let coordinator = CalibrationCoordinator::new(Arc::new(EventDispatcher::new()));
    coordinator.on_new_frame(generate_mock_pixels(4));
    coordinator.on_new_frame(generate_mock_pixels(1));
    let regular = generate_mock_pixels(3);

    c.bench_function("calibrate_regular_frame", |b| {
        b.iter(|| coordinator.on_new_frame(black_box(regular.clone())))
    });
}

criterion_group!(
    benches,
    benchmark_decode,
    benchmark_frame_operations,
    benchmark_fix_bad_pixels,
    benchmark_regular_frame
);
criterion_main!(benches);
