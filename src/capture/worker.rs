//! Compute stage: pitch estimation off the realtime thread.
//!
//! Blocks arrive from the input callback through one ring, estimates leave
//! through another. The worker owns all of its state; nothing is shared
//! with the callback except the rings.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use rtrb::{Consumer, Producer};

use super::router::{SampleBlock, BLOCK_LEN};
use crate::pitch::PitchEstimator;

/// Sleep between polls of an empty input ring.
const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// One smoothed estimate from the compute stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEstimate {
    /// Semitone, 0 for no pitch
    pub note: i32,
    /// Detection-path samples consumed when this estimate was made
    pub sample_index: u64,
}

/// Sliding analysis window fed in fixed blocks.
struct AnalysisWindow {
    samples: Vec<f32>,
    filled: usize,
    since_estimate: usize,
    hop_len: usize,
}

impl AnalysisWindow {
    fn new(window_len: usize, hop_len: usize) -> Self {
        Self {
            samples: vec![0.0; window_len],
            filled: 0,
            since_estimate: 0,
            hop_len: hop_len.max(1),
        }
    }

    /// Append a block; true when a new estimate is due.
    fn push(&mut self, block: &[f32]) -> bool {
        let len = self.samples.len();
        let n = block.len().min(len);
        self.samples.copy_within(n.., 0);
        self.samples[len - n..].copy_from_slice(&block[block.len() - n..]);
        self.filled = (self.filled + n).min(len);
        self.since_estimate += n;

        if self.filled == len && self.since_estimate >= self.hop_len {
            self.since_estimate = 0;
            true
        } else {
            false
        }
    }
}

/// Handle to the running analysis thread.
pub struct AnalysisWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    /// Spawn the worker. It runs until [`AnalysisWorker::stop`] or drop.
    pub fn spawn(
        mut estimator: PitchEstimator,
        mut blocks: Consumer<SampleBlock>,
        mut results: Producer<FrameEstimate>,
        hop_len: usize,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let handle = thread::Builder::new()
            .name("pitch-analysis".into())
            .spawn(move || {
                let mut window = AnalysisWindow::new(estimator.window_len(), hop_len);
                let mut consumed: u64 = 0;
                log::debug!("analysis worker started");

                while !flag.load(Ordering::Acquire) {
                    let Ok(block) = blocks.pop() else {
                        thread::sleep(IDLE_SLEEP);
                        continue;
                    };
                    consumed += BLOCK_LEN as u64;

                    if !window.push(block.samples()) {
                        continue;
                    }

                    let note = match estimator.estimate(&window.samples) {
                        Ok(note) => note,
                        Err(err) => {
                            log::warn!("estimation failed, treating frame as silence: {err}");
                            estimator.push_silence()
                        }
                    };

                    let estimate = FrameEstimate {
                        note,
                        sample_index: consumed,
                    };
                    if results.push(estimate).is_err() {
                        log::trace!("estimate ring full, dropping estimate");
                    }
                }
                log::debug!("analysis worker stopped after {consumed} samples");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("analysis worker panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
