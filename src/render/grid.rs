//! Staff lines: one per semitone, one per bar.

use super::view::{PitchRange, ViewWindow};
use crate::pitch::is_c;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemitoneLine {
    pub semitone: i32,
    /// C lines are drawn heavier
    pub is_c: bool,
}

pub fn semitone_lines(range: &PitchRange) -> Vec<SemitoneLine> {
    (range.low..=range.high)
        .map(|semitone| SemitoneLine {
            semitone,
            is_c: is_c(semitone),
        })
        .collect()
}

/// Bar boundaries `offset + k * bar_ms` that fall inside the window.
pub fn measure_lines(window: &ViewWindow, bar_ms: f64, bar_offset_ms: f64) -> Vec<f64> {
    if bar_ms <= 0.0 {
        return Vec::new();
    }
    let first = ((window.start_ms - bar_offset_ms) / bar_ms).ceil();
    let mut lines = Vec::new();
    let mut k = first;
    loop {
        let t = bar_offset_ms + k * bar_ms;
        if t >= window.end_ms {
            break;
        }
        lines.push(t);
        k += 1.0;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_ms: f64, end_ms: f64) -> ViewWindow {
        ViewWindow {
            start_ms,
            end_ms,
            now_ms: start_ms,
        }
    }

    #[test]
    fn test_semitone_lines_mark_c() {
        let lines = semitone_lines(&PitchRange { low: 58, high: 62 });
        assert_eq!(lines.len(), 5);
        let cs: Vec<_> = lines.iter().filter(|l| l.is_c).map(|l| l.semitone).collect();
        assert_eq!(cs, vec![60]);
    }

    #[test]
    fn test_measure_lines_follow_anchor() {
        assert_eq!(measure_lines(&window(1000.0, 5000.0), 2000.0, 500.0), vec![2500.0, 4500.0]);
        assert_eq!(
            measure_lines(&window(0.0, 4000.0), 2000.0, 0.0),
            vec![0.0, 2000.0]
        );
        // Anchor after the window start still yields earlier bars
        assert_eq!(measure_lines(&window(0.0, 3000.0), 2000.0, 2500.0), vec![500.0, 2500.0]);
        assert!(measure_lines(&window(0.0, 1000.0), 0.0, 0.0).is_empty());
    }
}
