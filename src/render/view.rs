//! Visible time window and pitch range.

use crate::melody::DEFAULT_BAR_MS;

/// Animation-frame times are snapped to this tick before layout.
pub const DEFAULT_TICK_MS: f64 = 16.0;

/// Widest staff shown, in semitones.
pub const MAX_SPAN: i32 = 48;
/// Semitones of headroom above and below the melody.
pub const RANGE_PADDING: i32 = 2;
/// Range shown before a melody is known (C3..C5).
pub const FALLBACK_RANGE: (i32, i32) = (48, 72);

/// Snap `time_ms` down to a multiple of `tick_ms`.
#[inline]
pub fn quantize_ms(time_ms: f64, tick_ms: f64) -> f64 {
    if tick_ms <= 0.0 {
        return time_ms;
    }
    (time_ms / tick_ms).floor() * tick_ms
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLayout {
    /// Window length in bars
    pub bars: f64,
    /// Horizontal position of "now" (0 = left edge, 1 = right edge)
    pub now_ratio: f64,
    pub tick_ms: f64,
}

impl Default for WindowLayout {
    fn default() -> Self {
        Self {
            bars: 2.0,
            now_ratio: 0.5,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

/// `[start_ms, end_ms)` shown on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewWindow {
    pub start_ms: f64,
    pub end_ms: f64,
    /// Quantised time the window was built around
    pub now_ms: f64,
}

impl ViewWindow {
    /// Place `now_ms` at `layout.now_ratio`, then clamp into `[0, total_ms]`.
    ///
    /// A song shorter than the window is shown from 0.
    pub fn around(now_ms: f64, bar_ms: f64, total_ms: f64, layout: &WindowLayout) -> Self {
        let bar_ms = if bar_ms > 0.0 { bar_ms } else { DEFAULT_BAR_MS };
        let len = bar_ms * layout.bars;
        let now = quantize_ms(now_ms, layout.tick_ms);

        let latest_start = (total_ms - len).max(0.0);
        let start = (now - len * layout.now_ratio).clamp(0.0, latest_start);
        Self {
            start_ms: start,
            end_ms: start + len,
            now_ms: now,
        }
    }

    pub fn len_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// Horizontal fraction of `time_ms`; outside `0..=1` when off-screen.
    #[inline]
    pub fn x(&self, time_ms: f64) -> f64 {
        (time_ms - self.start_ms) / self.len_ms()
    }

    pub fn contains(&self, time_ms: f64) -> bool {
        self.start_ms <= time_ms && time_ms < self.end_ms
    }
}

/// Inclusive semitone range of the staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchRange {
    pub low: i32,
    pub high: i32,
}

impl PitchRange {
    /// Pad the melody's bounds and cap the span, centred on the melody.
    pub fn for_bounds(bounds: Option<(i32, i32)>) -> Self {
        let (min, max) = bounds.unwrap_or(FALLBACK_RANGE);
        let (low, high) = (min - RANGE_PADDING, max + RANGE_PADDING);
        if high - low <= MAX_SPAN {
            return Self { low, high };
        }
        let centre = (min + max) / 2;
        Self {
            low: centre - MAX_SPAN / 2,
            high: centre + MAX_SPAN / 2,
        }
    }

    pub fn span(&self) -> i32 {
        self.high - self.low
    }

    pub fn contains(&self, semitone: i32) -> bool {
        (self.low..=self.high).contains(&semitone)
    }

    /// Vertical fraction, 0 at `low` and 1 at `high`.
    #[inline]
    pub fn y(&self, semitone: f64) -> f64 {
        let span = self.span().max(1) as f64;
        (semitone - self.low as f64) / span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(quantize_ms(33.0, 16.0), 32.0);
        assert_eq!(quantize_ms(15.9, 16.0), 0.0);
        assert_eq!(quantize_ms(12.3, 0.0), 12.3);
    }

    #[test]
    fn test_window_centres_now_and_clamps() {
        let layout = WindowLayout::default();
        let w = ViewWindow::around(10_000.0, 2000.0, 60_000.0, &layout);
        assert_eq!((w.start_ms, w.end_ms), (8000.0, 12_000.0));
        assert_eq!(w.x(10_000.0), 0.5);

        let early = ViewWindow::around(500.0, 2000.0, 60_000.0, &layout);
        assert_eq!(early.start_ms, 0.0);

        let late = ViewWindow::around(59_990.0, 2000.0, 60_000.0, &layout);
        assert_eq!(late.end_ms, 60_000.0);

        let short = ViewWindow::around(1000.0, 2000.0, 1500.0, &layout);
        assert_eq!(short.start_ms, 0.0);
    }

    #[test]
    fn test_window_time_is_quantised() {
        let layout = WindowLayout::default();
        let a = ViewWindow::around(10_001.0, 2000.0, 60_000.0, &layout);
        let b = ViewWindow::around(10_015.0, 2000.0, 60_000.0, &layout);
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_bar_length_uses_default() {
        let w = ViewWindow::around(0.0, 0.0, 60_000.0, &WindowLayout::default());
        assert_eq!(w.len_ms(), 2.0 * DEFAULT_BAR_MS);
    }

    #[test]
    fn test_pitch_range_padding_and_cap() {
        assert_eq!(PitchRange::for_bounds(Some((60, 67))), PitchRange { low: 58, high: 69 });

        let wide = PitchRange::for_bounds(Some((30, 100)));
        assert_eq!(wide.span(), MAX_SPAN);
        assert_eq!((wide.low + wide.high) / 2, 65);

        assert_eq!(PitchRange::for_bounds(None), PitchRange { low: 46, high: 74 });
    }
}
