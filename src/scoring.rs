//! Take scoring: how much of the voiced singing hit the melody.
//!
//! Only voiced samples (note > 0) that fall inside a melody note count.
//! A sample inside a note matches when it is within one semitone of it.
//! Silence and samples between notes are left out of both the numerator and
//! the denominator, so pausing to breathe never costs points.

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    capture::AudioBlob,
    melody::MelodyNote,
    timeline::PitchSample,
};

/// Semitones a sung note may miss the melody by and still count.
pub const PITCH_TOLERANCE: i32 = 1;

/// Whether a sung semitone matches a melody pitch.
#[inline]
pub fn is_match(sung: i32, target: i32) -> bool {
    (sung - target).abs() <= PITCH_TOLERANCE
}

/// First note whose `[start_ms, end_ms)` contains `time_ms`.
#[inline]
pub fn containing_note(notes: &[MelodyNote], time_ms: f64) -> Option<&MelodyNote> {
    notes.iter().find(|n| n.contains(time_ms))
}

/// Matched and comparable sample counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tally {
    pub matched: usize,
    pub total: usize,
}

impl Tally {
    /// Rounded percentage, 0 when nothing was comparable.
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (100.0 * self.matched as f64 / self.total as f64).round() as u8
    }
}

/// Count comparable and matching samples.
pub fn tally(samples: &[PitchSample], notes: &[MelodyNote]) -> Tally {
    let mut tally = Tally::default();
    for sample in samples.iter().filter(|s| s.is_voiced()) {
        let Some(note) = containing_note(notes, sample.time_ms) else {
            continue;
        };
        tally.total += 1;
        if is_match(sample.note, note.pitch) {
            tally.matched += 1;
        }
    }
    tally
}

/// Accuracy percentage in `0..=100`.
pub fn score(samples: &[PitchSample], notes: &[MelodyNote]) -> u8 {
    tally(samples, notes).percentage()
}

/// Outcome of one take, created once when the take stops.
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub percentage: u8,
    pub tally: Tally,
    pub recording: Option<AudioBlob>,
    pub timeline: Arc<[PitchSample]>,
    pub duration_ms: f64,
    /// Capture start minus playback start, in milliseconds
    pub recording_offset_ms: f64,
}

impl ScoreResult {
    pub fn new(
        timeline: Arc<[PitchSample]>,
        notes: &[MelodyNote],
        recording: Option<AudioBlob>,
        duration_ms: f64,
        recording_offset_ms: f64,
    ) -> Self {
        let tally = tally(&timeline, notes);
        Self {
            percentage: tally.percentage(),
            tally,
            recording,
            timeline,
            duration_ms,
            recording_offset_ms,
        }
    }
}
