//! Reference melody: the notes a take is compared against.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

/// Bar length used when the melody carries no tempo.
pub const DEFAULT_BAR_MS: f64 = 2000.0;

/// One reference note. The interval is half-open: `[start_ms, end_ms)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MelodyNote {
    pub start_ms: f64,
    pub end_ms: f64,
    /// Semitone (MIDI note number)
    pub pitch: i32,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub frequency: Option<f32>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
}

impl MelodyNote {
    pub fn new(start_ms: f64, end_ms: f64, pitch: i32) -> Self {
        Self {
            start_ms,
            end_ms,
            pitch,
            frequency: None,
            name: None,
        }
    }

    #[inline]
    pub fn contains(&self, time_ms: f64) -> bool {
        self.start_ms <= time_ms && time_ms < self.end_ms
    }

    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Decoded melody file.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Melody {
    pub notes: Vec<MelodyNote>,
    pub total_duration_ms: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bpm: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bar_offset_ms: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub key: Option<String>,
}

impl Melody {
    pub fn new(notes: Vec<MelodyNote>, total_duration_ms: f64) -> Self {
        let mut melody = Self {
            notes,
            total_duration_ms,
            ..Default::default()
        };
        melody.sort();
        melody
    }

    fn sort(&mut self) {
        self.notes
            .sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
    }

    /// Shift every note and the bar anchor by `offset_ms`.
    pub fn with_offset(mut self, offset_ms: f64) -> Self {
        if offset_ms == 0.0 {
            return self;
        }
        for note in &mut self.notes {
            note.start_ms += offset_ms;
            note.end_ms += offset_ms;
        }
        self.bar_offset_ms = Some(self.bar_offset_ms.unwrap_or(0.0) + offset_ms);
        self
    }

    /// First note whose half-open interval contains `time_ms`.
    pub fn note_at(&self, time_ms: f64) -> Option<&MelodyNote> {
        self.notes.iter().find(|n| n.contains(time_ms))
    }

    /// Duration of one bar (4 beats), or the default when no tempo is known.
    pub fn bar_ms(&self) -> f64 {
        match self.bpm {
            Some(bpm) if bpm > 0.0 => 4.0 * 60_000.0 / bpm,
            _ => DEFAULT_BAR_MS,
        }
    }

    /// Lowest and highest pitch, if any notes exist.
    pub fn pitch_bounds(&self) -> Option<(i32, i32)> {
        let min = self.notes.iter().map(|n| n.pitch).min()?;
        let max = self.notes.iter().map(|n| n.pitch).max()?;
        Some((min, max))
    }

    /// Notes overlapping `[start_ms, end_ms)`.
    pub fn notes_in(&self, start_ms: f64, end_ms: f64) -> impl Iterator<Item = &MelodyNote> {
        self.notes
            .iter()
            .filter(move |n| n.end_ms > start_ms && n.start_ms < end_ms)
    }
}

/// Source of melodies (file-format decoders live outside the core).
pub trait MelodyDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Melody, TrainerError>;
}

/// Decodes the JSON shape of [`Melody`].
#[cfg(feature = "serde")]
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMelodyDecoder;

#[cfg(feature = "serde")]
impl MelodyDecoder for JsonMelodyDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Melody, TrainerError> {
        let mut melody: Melody =
            serde_json::from_slice(bytes).map_err(|e| TrainerError::Decode {
                source_name: "melody".to_string(),
                reason: e.to_string(),
            })?;
        melody.sort();
        Ok(melody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_lookup() {
        let melody = Melody::new(
            vec![MelodyNote::new(0.0, 500.0, 60), MelodyNote::new(500.0, 1000.0, 62)],
            1000.0,
        );
        assert_eq!(melody.note_at(0.0).unwrap().pitch, 60);
        assert_eq!(melody.note_at(499.9).unwrap().pitch, 60);
        assert_eq!(melody.note_at(500.0).unwrap().pitch, 62);
        assert!(melody.note_at(1000.0).is_none());
    }

    #[test]
    fn test_offset_moves_notes_and_anchor() {
        let melody = Melody::new(vec![MelodyNote::new(100.0, 200.0, 60)], 1000.0)
            .with_offset(-50.0);
        assert_eq!(melody.notes[0].start_ms, 50.0);
        assert_eq!(melody.notes[0].end_ms, 150.0);
        assert_eq!(melody.bar_offset_ms, Some(-50.0));
    }

    #[test]
    fn test_bar_length() {
        let mut melody = Melody::default();
        assert_eq!(melody.bar_ms(), DEFAULT_BAR_MS);
        melody.bpm = Some(120.0);
        assert_eq!(melody.bar_ms(), 2000.0);
        melody.bpm = Some(100.0);
        assert_eq!(melody.bar_ms(), 2400.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_decoder_sorts_notes() {
        let json = br#"{
            "notes": [
                { "startMs": 500, "endMs": 900, "pitch": 64 },
                { "startMs": 0, "endMs": 400, "pitch": 60, "name": "C4" }
            ],
            "totalDurationMs": 1000,
            "bpm": 90
        }"#;
        let melody = JsonMelodyDecoder.decode(json).unwrap();
        assert_eq!(melody.notes[0].pitch, 60);
        assert_eq!(melody.notes[0].name.as_deref(), Some("C4"));
        assert_eq!(melody.bpm, Some(90.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_decoder_reports_decode_error() {
        assert!(matches!(
            JsonMelodyDecoder.decode(b"not json"),
            Err(TrainerError::Decode { .. })
        ));
    }
}
