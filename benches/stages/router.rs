//! Benchmarks for the input callback body.

use std::{hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion};
use pitch_trainer::{
    capture::{InputRouter, RouterStats, SampleBlock},
    conditioner::SignalConditioner,
    config::DeviceProfile,
    dsp::tone::sine,
};
use rtrb::RingBuffer;

use crate::BLOCK_SIZES;

pub fn bench_router(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture/router");

    for &size in BLOCK_SIZES {
        let (atx, mut arx) = RingBuffer::<SampleBlock>::new(64);
        let (rtx, mut rrx) = RingBuffer::<f32>::new(48_000);
        let conditioner = SignalConditioner::new(&DeviceProfile::MOBILE_B, 48_000.0, 30);
        let mut router =
            InputRouter::new(1, conditioner, atx, rtx, Arc::new(RouterStats::default()));
        let input = sine(220.0, 48_000.0, size);

        group.bench_with_input(BenchmarkId::new("process", size), &size, |b, _| {
            b.iter(|| {
                router.process(black_box(&input));
                // Keep the rings from filling so every iteration does full work
                while arx.pop().is_ok() {}
                while rrx.pop().is_ok() {}
            })
        });
    }

    group.finish();
}
