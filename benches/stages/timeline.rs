//! Benchmarks for queries over a full-length take.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use pitch_trainer::{
    melody::{Melody, MelodyNote},
    render::{sung_segments, PitchRange, ViewWindow, WindowLayout},
    scoring::score,
    timeline::{PitchSample, PitchTimeline},
};

pub fn bench_timeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline");

    for &minutes in &[1usize, 4, 10] {
        let duration_ms = (minutes * 60_000) as f64;
        let notes: Vec<MelodyNote> = (0..minutes * 120)
            .map(|i| {
                let start = i as f64 * 500.0;
                MelodyNote::new(start, start + 450.0, 55 + (i % 12) as i32)
            })
            .collect();
        let melody = Melody::new(notes, duration_ms);

        let mut timeline = PitchTimeline::with_capacity_for(duration_ms, 20.0);
        let mut t = 0.0;
        let mut i = 0;
        while t < duration_ms {
            timeline.push(PitchSample::new(t, 55 + (i / 25 % 12) as i32));
            t += 20.0;
            i += 1;
        }

        let window = ViewWindow::around(duration_ms / 2.0, 2000.0, duration_ms, &WindowLayout::default());
        let range = PitchRange::for_bounds(melody.pitch_bounds());

        group.bench_with_input(BenchmarkId::new("range", minutes), &minutes, |b, _| {
            b.iter(|| timeline.range(black_box(window.start_ms), black_box(window.end_ms)).len())
        });

        group.bench_with_input(BenchmarkId::new("segments", minutes), &minutes, |b, _| {
            b.iter(|| {
                sung_segments(
                    black_box(timeline.samples()),
                    &melody.notes,
                    &window,
                    &range,
                    20.0,
                )
            })
        });

        group.bench_with_input(BenchmarkId::new("score", minutes), &minutes, |b, _| {
            b.iter(|| score(black_box(timeline.samples()), &melody.notes))
        });
    }

    group.finish();
}
