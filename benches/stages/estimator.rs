//! Benchmarks for pitch estimation over one analysis window.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use pitch_trainer::{
    config::{DeviceProfile, EstimatorConfig},
    dsp::tone::sine,
    pitch::{mcleod::McLeod, PitchEstimator},
};

pub fn bench_estimator(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture/estimator");
    let sr = 48_000.0;

    for &window_len in &[1024usize, 2048, 4096] {
        let voiced: Vec<f32> = sine(196.0, sr, window_len).iter().map(|s| s * 0.3).collect();
        let mut mpm = McLeod::new(window_len, sr, 65.0, 1050.0);

        group.bench_with_input(BenchmarkId::new("mcleod", window_len), &window_len, |b, _| {
            b.iter(|| mpm.estimate(black_box(&voiced)))
        });

        let config = EstimatorConfig {
            window_len,
            ..EstimatorConfig::default()
        };
        let mut estimator = PitchEstimator::new(&config, &DeviceProfile::DESKTOP, sr);
        group.bench_with_input(BenchmarkId::new("estimate", window_len), &window_len, |b, _| {
            b.iter(|| estimator.estimate(black_box(&voiced)))
        });

        // Gated windows skip the FFT entirely
        let quiet = vec![0.0001f32; window_len];
        group.bench_with_input(BenchmarkId::new("silent", window_len), &window_len, |b, _| {
            b.iter(|| estimator.estimate(black_box(&quiet)))
        });
    }

    group.finish();
}
