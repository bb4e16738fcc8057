//! Frame-to-frame smoothing of semitone estimates.

use std::collections::VecDeque;

/// Trailing median filter with single-step jump rejection.
///
/// Every frame feeds exactly one value into the median window: the accepted
/// semitone, or 0 for silence and rejected frames. Only accepted pitches move
/// the stable reference used by the jump check.
#[derive(Debug, Clone)]
pub struct PitchStabilizer {
    history: VecDeque<i32>,
    scratch: Vec<i32>,
    median_len: usize,
    max_jump: i32,
    jump_reset_after: u32,
    last_stable: i32,
    rejected_run: u32,
}

impl PitchStabilizer {
    pub fn new(median_len: usize, max_jump: i32, jump_reset_after: u32) -> Self {
        let median_len = median_len.max(1);
        Self {
            history: VecDeque::with_capacity(median_len),
            scratch: Vec::with_capacity(median_len),
            median_len,
            max_jump,
            jump_reset_after,
            last_stable: 0,
            rejected_run: 0,
        }
    }

    /// Feed one frame. `None` is a silent or rejected frame.
    /// Returns the smoothed semitone, 0 for silence.
    pub fn push(&mut self, raw: Option<i32>) -> i32 {
        let value = match raw {
            Some(note) if note > 0 => self.check_jump(note),
            _ => 0,
        };

        if self.history.len() == self.median_len {
            self.history.pop_front();
        }
        self.history.push_back(value);

        self.median()
    }

    /// Last accepted semitone (0 before the first one).
    pub fn last_stable(&self) -> i32 {
        self.last_stable
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_stable = 0;
        self.rejected_run = 0;
    }

    fn check_jump(&mut self, note: i32) -> i32 {
        if self.last_stable > 0 && (note - self.last_stable).abs() >= self.max_jump {
            self.rejected_run += 1;
            if self.jump_reset_after == 0 || self.rejected_run < self.jump_reset_after {
                log::trace!(
                    "jump rejected: {} -> {} ({} in a row)",
                    self.last_stable,
                    note,
                    self.rejected_run
                );
                return 0;
            }
            // The singer really moved; stop fighting it
            log::debug!("accepting register change {} -> {}", self.last_stable, note);
        }
        self.rejected_run = 0;
        self.last_stable = note;
        note
    }

    /// Median of the partial or full window (upper median for even counts).
    fn median(&mut self) -> i32 {
        self.scratch.clear();
        self.scratch.extend(self.history.iter().copied());
        self.scratch.sort_unstable();
        self.scratch[self.scratch.len() / 2]
    }
}
