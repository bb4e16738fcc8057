//! Timed lyric lines and the "what is being sung now" query.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "serde")]
use crate::error::TrainerError;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct LyricLine {
    pub time_ms: f64,
    pub text: String,
}

/// Lyric lines ordered by start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lyrics {
    lines: Vec<LyricLine>,
}

impl Lyrics {
    pub fn new(mut lines: Vec<LyricLine>) -> Self {
        lines.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        Self { lines }
    }

    /// Shift every line by `offset_ms`.
    pub fn with_offset(mut self, offset_ms: f64) -> Self {
        for line in &mut self.lines {
            line.time_ms += offset_ms;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of the line active at `time_ms` (last line started at or before it).
    pub fn current_index(&self, time_ms: f64) -> Option<usize> {
        let after = self.lines.partition_point(|l| l.time_ms <= time_ms);
        after.checked_sub(1)
    }

    /// The active line followed by up to `count - 1` upcoming lines.
    ///
    /// Before the first line starts, the upcoming lines are returned.
    pub fn lines_at(&self, time_ms: f64, count: usize) -> &[LyricLine] {
        let start = self.current_index(time_ms).unwrap_or(0);
        let end = (start + count).min(self.lines.len());
        &self.lines[start.min(end)..end]
    }
}

/// Decode the JSON array shape `[{ "timeMs": .., "text": .. }]`.
#[cfg(feature = "serde")]
pub fn decode_json(bytes: &[u8]) -> Result<Lyrics, TrainerError> {
    let lines: Vec<LyricLine> =
        serde_json::from_slice(bytes).map_err(|e| TrainerError::Decode {
            source_name: "lyrics".to_string(),
            reason: e.to_string(),
        })?;
    Ok(Lyrics::new(lines))
}
