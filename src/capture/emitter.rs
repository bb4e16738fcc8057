//! Fixed-cadence pitch events.
//!
//! The worker produces estimates whenever it has a full hop of audio. The
//! emitter drains them into a single "latest" slot and, every `interval`,
//! tags that value with the playback position the caller supplies. Capture
//! time is never used: only playback-synchronised timestamps compare
//! against the melody.

use std::time::Duration;

use rtrb::Consumer;

use super::worker::FrameEstimate;
use crate::{store::MicDelay, timeline::PitchSample};

pub struct PitchEmitter {
    results: Consumer<FrameEstimate>,
    latest: i32,
    interval: Duration,
    next_due: Option<Duration>,
    delay: MicDelay,
    emitted: u64,
}

impl PitchEmitter {
    pub fn new(results: Consumer<FrameEstimate>, interval: Duration, delay: MicDelay) -> Self {
        Self {
            results,
            latest: 0,
            interval,
            next_due: None,
            delay,
            emitted: 0,
        }
    }

    /// Arm the cadence; the first event is due at `now`.
    pub fn start(&mut self, now: Duration) {
        self.latest = 0;
        self.emitted = 0;
        self.next_due = Some(now);
    }

    /// Halt the cadence. Later polls emit nothing.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Most recent estimate seen from the worker.
    pub fn latest(&self) -> i32 {
        self.latest
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Drain worker output and emit one event if the cadence is due.
    ///
    /// `position_ms` is the transport's current playback position. A late
    /// poll emits a single event and re-anchors instead of bursting.
    pub fn poll(&mut self, now: Duration, position_ms: f64) -> Option<PitchSample> {
        while let Ok(estimate) = self.results.pop() {
            self.latest = estimate.note;
        }

        let due = self.next_due?;
        if now < due {
            return None;
        }
        let next = due + self.interval;
        self.next_due = Some(if next <= now { now + self.interval } else { next });

        self.emitted += 1;
        let time_ms = position_ms - f64::from(self.delay.get_ms());
        Some(PitchSample::new(time_ms, self.latest))
    }
}
