//! Append-only pitch timeline for one take.
//!
//! Samples arrive from the emission cadence every ~20 ms. They are staged
//! one at a time and committed in batches (once per UI frame). Each commit
//! bumps a version counter so readers can tell "something changed" without
//! comparing contents. Readers either poll `version()` or register an
//! observer.
//!
//! Timestamps are non-decreasing, so a window query is a binary search for
//! the lower bound plus a forward scan: O(log n + k).

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One detected pitch at a playback-synchronised time. `note == 0` is silence.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PitchSample {
    pub time_ms: f64,
    pub note: i32,
}

impl PitchSample {
    pub fn new(time_ms: f64, note: i32) -> Self {
        Self { time_ms, note }
    }

    #[inline]
    pub fn is_voiced(&self) -> bool {
        self.note > 0
    }
}

/// Samples with `start_ms <= time_ms < end_ms` from a time-sorted slice.
pub fn window(samples: &[PitchSample], start_ms: f64, end_ms: f64) -> &[PitchSample] {
    let lower = samples.partition_point(|s| s.time_ms < start_ms);
    let len = samples[lower..]
        .iter()
        .take_while(|s| s.time_ms < end_ms)
        .count();
    &samples[lower..lower + len]
}

type Observer = Box<dyn FnMut(u64, &[PitchSample]) + Send>;

/// Single-writer accumulation buffer for the active take.
#[derive(Default)]
pub struct PitchTimeline {
    samples: Vec<PitchSample>,
    pending: Vec<PitchSample>,
    version: u64,
    dropped: u64,
    observers: Vec<Observer>,
}

impl PitchTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for a take of `duration_ms` at `interval_ms` cadence.
    pub fn with_capacity_for(duration_ms: f64, interval_ms: f64) -> Self {
        let capacity = if interval_ms > 0.0 {
            (duration_ms / interval_ms).ceil().max(0.0) as usize + 1
        } else {
            0
        };
        Self {
            samples: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Register a callback run after every non-empty commit with the new
    /// version and the freshly committed batch.
    pub fn subscribe(&mut self, observer: impl FnMut(u64, &[PitchSample]) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn last_time(&self) -> Option<f64> {
        self.pending
            .last()
            .or_else(|| self.samples.last())
            .map(|s| s.time_ms)
    }

    /// Stage one sample for the next commit. O(1).
    ///
    /// A sample older than the newest one is dropped (returns `false`) so the
    /// committed sequence stays ordered.
    pub fn stage(&mut self, sample: PitchSample) -> bool {
        if let Some(last) = self.last_time() {
            if sample.time_ms < last {
                self.dropped += 1;
                log::debug!(
                    "dropping out-of-order pitch sample at {:.1} ms (last {:.1} ms)",
                    sample.time_ms,
                    last
                );
                return false;
            }
        }
        self.pending.push(sample);
        true
    }

    /// Move staged samples into the timeline in arrival order.
    /// Returns how many were committed.
    pub fn commit(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let start = self.samples.len();
        let count = self.pending.len();
        self.samples.append(&mut self.pending);
        self.version += 1;

        let batch = &self.samples[start..];
        for observer in &mut self.observers {
            observer(self.version, batch);
        }
        count
    }

    /// Stage and commit a single sample.
    pub fn push(&mut self, sample: PitchSample) -> bool {
        let staged = self.stage(sample);
        self.commit();
        staged
    }

    /// Monotonic change counter, bumped once per non-empty commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Samples rejected for arriving out of order.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Committed samples.
    pub fn samples(&self) -> &[PitchSample] {
        &self.samples
    }

    /// Committed samples with `start_ms <= time_ms < end_ms`.
    pub fn range(&self, start_ms: f64, end_ms: f64) -> &[PitchSample] {
        window(&self.samples, start_ms, end_ms)
    }

    /// Copy of the committed samples, detached from further writes.
    pub fn snapshot(&self) -> Arc<[PitchSample]> {
        Arc::from(self.samples.as_slice())
    }

    /// Empty the buffer for a new take. The version keeps counting.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.pending.clear();
        self.dropped = 0;
        self.version += 1;
    }
}

impl std::fmt::Debug for PitchTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchTimeline")
            .field("len", &self.samples.len())
            .field("pending", &self.pending.len())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    fn filled(times: &[f64]) -> PitchTimeline {
        let mut t = PitchTimeline::new();
        for &time in times {
            t.stage(PitchSample::new(time, 60));
        }
        t.commit();
        t
    }

    #[test]
    fn test_version_bumps_per_batch() {
        let mut t = PitchTimeline::new();
        assert_eq!(t.version(), 0);
        t.stage(PitchSample::new(0.0, 60));
        t.stage(PitchSample::new(20.0, 61));
        assert_eq!(t.len(), 0);
        assert_eq!(t.commit(), 2);
        assert_eq!(t.version(), 1);
        assert_eq!(t.commit(), 0);
        assert_eq!(t.version(), 1);
    }

    #[test]
    fn test_out_of_order_is_dropped() {
        let mut t = PitchTimeline::new();
        assert!(t.push(PitchSample::new(100.0, 60)));
        assert!(!t.push(PitchSample::new(50.0, 60)));
        assert!(t.push(PitchSample::new(100.0, 62)));
        assert_eq!(t.len(), 2);
        assert_eq!(t.dropped(), 1);
    }

    #[test]
    fn test_range_is_half_open() {
        let t = filled(&[0.0, 20.0, 40.0, 60.0, 80.0]);
        let r = t.range(20.0, 60.0);
        assert_eq!(r.len(), 2);
        assert_eq!(r[0].time_ms, 20.0);
        assert_eq!(r[1].time_ms, 40.0);
        assert!(t.range(100.0, 200.0).is_empty());
        assert_eq!(t.range(-10.0, 1.0).len(), 1);
    }

    #[test]
    fn test_range_matches_linear_scan() {
        // Runs of duplicated timestamps
        let times: Vec<f64> = (0..500).map(|i| (i / 3) as f64 * 7.5).collect();
        let t = filled(&times);
        for (a, b) in [(0.0, 10.0), (7.5, 7.5), (33.0, 250.0), (-5.0, 5000.0), (100.0, 99.0)] {
            let expected: Vec<_> = t
                .samples()
                .iter()
                .filter(|s| a <= s.time_ms && s.time_ms < b)
                .copied()
                .collect();
            assert_eq!(t.range(a, b), expected.as_slice(), "window [{a}, {b})");
        }
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut t = filled(&[0.0, 20.0]);
        let snap = t.snapshot();
        t.push(PitchSample::new(40.0, 60));
        assert_eq!(snap.len(), 2);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_observer_sees_each_batch() {
        let seen = Arc::new(AtomicU64::new(0));
        let mut t = PitchTimeline::new();
        let counter = seen.clone();
        t.subscribe(move |_, batch| {
            counter.fetch_add(batch.len() as u64, Ordering::Relaxed);
        });
        t.stage(PitchSample::new(0.0, 60));
        t.stage(PitchSample::new(20.0, 60));
        t.commit();
        t.push(PitchSample::new(40.0, 60));
        assert_eq!(seen.load(Ordering::Relaxed), 3);
    }
}
