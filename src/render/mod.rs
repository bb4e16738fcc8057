//! Pitch-bar scene model.
//!
//! Turns the melody, the sung timeline and a view time into plain
//! primitives in normalised coordinates (x and y in `0..=1`, y up). The
//! front end only maps them to cells or pixels.

pub mod grid;
pub mod pan;
pub mod view;

pub use grid::{measure_lines, semitone_lines, SemitoneLine};
pub use pan::PanGesture;
pub use view::{quantize_ms, PitchRange, ViewWindow, WindowLayout};

use crate::{
    melody::{Melody, MelodyNote},
    scoring::{containing_note, is_match},
    timeline::{self, PitchSample},
};

/// One melody note clipped to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteBar {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
    pub pitch: i32,
}

/// A run of equal sung samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SungSegment {
    pub x0: f64,
    pub x1: f64,
    pub y: f64,
    pub note: i32,
    /// Within tolerance of the melody note active at the segment start
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchBarScene {
    pub window: ViewWindow,
    pub range: PitchRange,
    pub semitones: Vec<SemitoneLine>,
    /// x of each bar line
    pub measures: Vec<f64>,
    pub notes: Vec<NoteBar>,
    pub sung: Vec<SungSegment>,
    /// x of the playhead, `None` when off-screen
    pub playhead: Option<f64>,
}

/// Inputs for one frame of the pitch bar.
pub struct SceneInput<'a> {
    pub melody: &'a Melody,
    /// Time-sorted samples (live timeline or a saved take)
    pub samples: &'a [PitchSample],
    /// Time the view is built around: playback position or the panned time
    pub view_ms: f64,
    /// Playback position, for the playhead
    pub position_ms: f64,
    /// Nominal spacing of samples, used to size the last segment
    pub sample_interval_ms: f64,
    pub layout: WindowLayout,
}

impl PitchBarScene {
    pub fn build(input: &SceneInput<'_>) -> Self {
        let melody = input.melody;
        let bar_ms = melody.bar_ms();
        let window = ViewWindow::around(
            input.view_ms,
            bar_ms,
            melody.total_duration_ms,
            &input.layout,
        );
        let range = PitchRange::for_bounds(melody.pitch_bounds());

        let measures = measure_lines(&window, bar_ms, melody.bar_offset_ms.unwrap_or(0.0))
            .into_iter()
            .map(|t| window.x(t))
            .collect();

        let notes = melody
            .notes_in(window.start_ms, window.end_ms)
            .map(|n| NoteBar {
                x0: window.x(n.start_ms).max(0.0),
                x1: window.x(n.end_ms).min(1.0),
                y: range.y(n.pitch as f64),
                pitch: n.pitch,
            })
            .collect();

        let sung = sung_segments(
            input.samples,
            &melody.notes,
            &window,
            &range,
            input.sample_interval_ms,
        );

        let playhead = window
            .contains(input.position_ms)
            .then(|| window.x(input.position_ms));

        Self {
            window,
            semitones: semitone_lines(&range),
            range,
            measures,
            notes,
            sung,
            playhead,
        }
    }
}

/// Segments for the samples inside the window.
///
/// Uses the timeline range query, so cost follows the window, not the take.
/// Silence and pitches outside the staff are skipped.
pub fn sung_segments(
    samples: &[PitchSample],
    notes: &[MelodyNote],
    window: &ViewWindow,
    range: &PitchRange,
    interval_ms: f64,
) -> Vec<SungSegment> {
    let visible = timeline::window(samples, window.start_ms, window.end_ms);
    let mut segments: Vec<SungSegment> = Vec::new();
    let mut open: Option<(f64, i32, bool)> = None;

    for (i, sample) in visible.iter().enumerate() {
        let end_ms = visible
            .get(i + 1)
            .map_or(sample.time_ms + interval_ms, |next| next.time_ms)
            .min(window.end_ms);

        let drawable = sample.is_voiced() && range.contains(sample.note);
        if !drawable {
            if let Some((start, note, matched)) = open.take() {
                segments.push(segment(window, range, start, sample.time_ms, note, matched));
            }
            continue;
        }

        let matched = containing_note(notes, sample.time_ms)
            .is_some_and(|n| is_match(sample.note, n.pitch));

        match open {
            Some((_, note, was_matched)) if note == sample.note && was_matched == matched => {}
            Some((start, note, was_matched)) => {
                segments.push(segment(window, range, start, sample.time_ms, note, was_matched));
                open = Some((sample.time_ms, sample.note, matched));
            }
            None => open = Some((sample.time_ms, sample.note, matched)),
        }

        if i + 1 == visible.len() {
            if let Some((start, note, matched)) = open.take() {
                segments.push(segment(window, range, start, end_ms, note, matched));
            }
        }
    }
    segments
}

fn segment(
    window: &ViewWindow,
    range: &PitchRange,
    start_ms: f64,
    end_ms: f64,
    note: i32,
    matched: bool,
) -> SungSegment {
    SungSegment {
        x0: window.x(start_ms),
        x1: window.x(end_ms),
        y: range.y(note as f64),
        note,
        matched,
    }
}
