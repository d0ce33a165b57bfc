//! Benchmarks for the per-window analysis cost
//!
//! The window transform is the dominant cost of a tick and must fit well
//! inside the task period for every supported window size.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use num_complex::Complex;
use vibration_analysis::module::VibrationAnalyzer;
use vibration_analysis::sensor::AccumulatorSnapshot;
use vibration_analysis::spectrum::SpectralTransform;
use vibration_analysis::{MemorySpectrumStore, WindowSize};

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_transform");

    for size in WindowSize::ALL {
        let n = size.samples();
        let mut transform = SpectralTransform::for_window(size);
        let signal: Vec<Complex<f32>> = (0..n)
            .map(|i| Complex::new((i as f32 * 0.37).sin(), 0.0))
            .collect();
        let mut buffer = signal.clone();
        let mut mags = vec![0.0; size.num_bins()];

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&signal);
                transform
                    .transform(black_box(&mut buffer), &mut mags)
                    .unwrap();
                black_box(&mags);
            })
        });
    }

    group.finish();
}

fn bench_full_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyzer_window");

    for size in WindowSize::ALL {
        let n = size.samples();
        let mut analyzer = VibrationAnalyzer::new(size, MemorySpectrumStore::new());
        let snapshot = AccumulatorSnapshot {
            sum: [0.1, -0.2, 9.81],
            count: 1,
        };

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                for _ in 0..n {
                    black_box(analyzer.tick(black_box(&snapshot)));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transform, bench_full_window);
criterion_main!(benches);
