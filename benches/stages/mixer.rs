//! Benchmarks for the output callback body.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use pitch_trainer::{
    dsp::tone::sine,
    transport::{AudioBuffer, AudioClock, PlaybackMixer, PlaybackSink, SourceId},
};

use crate::BLOCK_SIZES;

pub fn bench_mixer(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback/mixer");

    for &size in BLOCK_SIZES {
        // 44.1 kHz stems into a 48 kHz stereo device: the resampling path
        let stem = AudioBuffer::new(sine(330.0, 44_100.0, 44_100 * 30), 1, 44_100);
        let (mut mixer, mut handle) = PlaybackMixer::new(48_000, 2, AudioClock::new(48_000));
        handle.load(SourceId::Instrumental, stem.clone()).unwrap();
        handle.load(SourceId::Take, stem).unwrap();
        handle.start(SourceId::Instrumental, 0.0, 0.0).unwrap();
        handle.start(SourceId::Take, 0.0, 0.0).unwrap();
        let mut out = vec![0.0f32; size * 2];

        group.bench_with_input(BenchmarkId::new("two_voices", size), &size, |b, _| {
            b.iter(|| {
                mixer.render(black_box(&mut out));
                if !mixer.is_playing(SourceId::Instrumental) {
                    handle.start(SourceId::Instrumental, 0.0, 0.0).unwrap();
                    handle.start(SourceId::Take, 0.0, 0.0).unwrap();
                }
            })
        });
    }

    group.finish();
}
