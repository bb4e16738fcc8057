//! Pitch estimation: one analysis window in, one semitone (or silence) out.
//!
//! The chain per window:
//!
//! 1. RMS gate: quiet windows are silence.
//! 2. Clip guard: windows whose peak exceeds full scale are rescaled by the
//!    peak so the estimator does not lock onto clipping harmonics.
//! 3. McLeod period estimate with a clarity floor.
//! 4. Frequency to nearest semitone, restricted to the singing range.
//! 5. Median + jump-rejection smoothing.

pub mod mcleod;
pub mod stabilizer;

use crate::{
    config::{DeviceProfile, EstimatorConfig},
    dsp::level::{normalize_peak, rms},
    error::TrainerError,
};

pub use mcleod::{McLeod, PeriodEstimate};
pub use stabilizer::PitchStabilizer;

/// Fractional MIDI semitone for a frequency (69 = A4 = 440 Hz).
#[inline]
pub fn frequency_to_semitone(frequency: f32) -> f32 {
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Frequency of a (possibly fractional) semitone.
#[inline]
pub fn semitone_to_frequency(semitone: f32) -> f32 {
    440.0 * 2.0_f32.powf((semitone - 69.0) / 12.0)
}

/// Nearest integer semitone for a frequency.
#[inline]
pub fn nearest_semitone(frequency: f32) -> i32 {
    frequency_to_semitone(frequency).round() as i32
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name, e.g. 60 → "C4".
pub fn semitone_name(semitone: i32) -> String {
    let name = NOTE_NAMES[semitone.rem_euclid(12) as usize];
    let octave = semitone.div_euclid(12) - 1;
    format!("{name}{octave}")
}

/// Whether a semitone is a C (drawn as a heavier gridline).
#[inline]
pub fn is_c(semitone: i32) -> bool {
    semitone.rem_euclid(12) == 0
}

/// What the estimator concluded about one window before smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Below the RMS gate
    Silent { rms: f32 },
    /// No periodic peak or clarity below the floor
    Unclear { clarity: f32 },
    /// Periodic, but outside the singing range (octave error)
    OutOfRange { semitone: i32 },
    Pitch {
        semitone: i32,
        frequency: f32,
        clarity: f32,
    },
}

impl Verdict {
    pub fn semitone(&self) -> Option<i32> {
        match *self {
            Verdict::Pitch { semitone, .. } => Some(semitone),
            _ => None,
        }
    }
}

/// Per-device pitch estimator with smoothing state.
pub struct PitchEstimator {
    detector: McLeod,
    stabilizer: PitchStabilizer,
    scratch: Vec<f32>,
    rms_threshold: f32,
    clarity_threshold: f32,
    min_semitone: i32,
    max_semitone: i32,
}

impl PitchEstimator {
    pub fn new(config: &EstimatorConfig, profile: &DeviceProfile, sample_rate: f32) -> Self {
        // Search a little beyond the accepted range so edge notes still peak
        let min_freq = semitone_to_frequency(config.min_semitone as f32 - 1.0);
        let max_freq = semitone_to_frequency(config.max_semitone as f32 + 1.0);

        Self {
            detector: McLeod::new(config.window_len, sample_rate, min_freq, max_freq),
            stabilizer: PitchStabilizer::new(
                config.median_len,
                config.max_jump,
                config.jump_reset_after,
            ),
            scratch: vec![0.0; config.window_len],
            rms_threshold: profile.rms_threshold,
            clarity_threshold: profile.clarity_threshold,
            min_semitone: config.min_semitone,
            max_semitone: config.max_semitone,
        }
    }

    pub fn window_len(&self) -> usize {
        self.detector.size()
    }

    /// Classify one window without touching the smoothing state.
    pub fn classify(&mut self, window: &[f32]) -> Result<Verdict, TrainerError> {
        if window.len() != self.detector.size() {
            return Err(TrainerError::Estimation(format!(
                "expected {} samples, got {}",
                self.detector.size(),
                window.len()
            )));
        }
        if window.iter().any(|s| !s.is_finite()) {
            return Err(TrainerError::Estimation(
                "window contains non-finite samples".to_string(),
            ));
        }

        let level = rms(window);
        if level < self.rms_threshold {
            return Ok(Verdict::Silent { rms: level });
        }

        self.scratch.copy_from_slice(window);
        let peak = normalize_peak(&mut self.scratch);
        if peak > 1.0 {
            log::trace!("clipped window rescaled (peak {peak:.2})");
        }

        let Some(estimate) = self.detector.estimate(&self.scratch) else {
            return Ok(Verdict::Unclear { clarity: 0.0 });
        };
        if estimate.clarity < self.clarity_threshold {
            return Ok(Verdict::Unclear {
                clarity: estimate.clarity,
            });
        }

        let semitone = nearest_semitone(estimate.frequency);
        if semitone < self.min_semitone || semitone > self.max_semitone {
            return Ok(Verdict::OutOfRange { semitone });
        }

        Ok(Verdict::Pitch {
            semitone,
            frequency: estimate.frequency,
            clarity: estimate.clarity,
        })
    }

    /// Estimate and smooth one window. Returns 0 for no pitch.
    pub fn estimate(&mut self, window: &[f32]) -> Result<i32, TrainerError> {
        let verdict = self.classify(window)?;
        match verdict {
            Verdict::Pitch { .. } => {}
            other => log::trace!("window rejected: {other:?}"),
        }
        Ok(self.stabilizer.push(verdict.semitone()))
    }

    /// Feed a silent frame into the smoother (used when a window is dropped).
    pub fn push_silence(&mut self) -> i32 {
        self.stabilizer.push(None)
    }

    pub fn reset(&mut self) {
        self.stabilizer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::tone::sine;

    const SR: f32 = 48_000.0;

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(&EstimatorConfig::default(), &DeviceProfile::DESKTOP, SR)
    }

    #[test]
    fn test_semitone_conversion() {
        assert_eq!(nearest_semitone(440.0), 69);
        assert_eq!(nearest_semitone(261.63), 60);
        assert_eq!(nearest_semitone(65.41), 36);
        assert!((semitone_to_frequency(81.0) - 880.0).abs() < 0.01);
    }

    #[test]
    fn test_semitone_names() {
        assert_eq!(semitone_name(60), "C4");
        assert_eq!(semitone_name(69), "A4");
        assert_eq!(semitone_name(37), "C#2");
        assert!(is_c(48));
        assert!(!is_c(50));
    }

    #[test]
    fn test_sung_note_is_detected() {
        let mut est = estimator();
        let window: Vec<f32> = sine(261.63, SR, 2048).iter().map(|s| s * 0.3).collect();
        assert_eq!(est.estimate(&window).unwrap(), 60);
    }

    #[test]
    fn test_quiet_window_is_silent() {
        let mut est = estimator();
        let window: Vec<f32> = sine(261.63, SR, 2048).iter().map(|s| s * 0.001).collect();
        assert!(matches!(est.classify(&window).unwrap(), Verdict::Silent { .. }));
        assert_eq!(est.estimate(&window).unwrap(), 0);
    }

    #[test]
    fn test_clipped_window_still_estimates() {
        let mut est = estimator();
        let window: Vec<f32> = sine(220.0, SR, 2048).iter().map(|s| s * 8.0).collect();
        assert_eq!(est.classify(&window).unwrap().semitone(), Some(57));
    }

    #[test]
    fn test_out_of_range_pitch() {
        let mut est = estimator();
        // C#6 is one semitone above the singing range
        let window: Vec<f32> = sine(1108.73, SR, 2048).iter().map(|s| s * 0.5).collect();
        let verdict = est.classify(&window).unwrap();
        assert!(matches!(verdict, Verdict::OutOfRange { semitone: 85 }), "{verdict:?}");
        assert_eq!(est.estimate(&window).unwrap(), 0);
    }

    #[test]
    fn test_malformed_window_is_an_error() {
        let mut est = estimator();
        assert!(matches!(
            est.estimate(&[0.1; 100]),
            Err(TrainerError::Estimation(_))
        ));
        let mut bad = vec![0.1; 2048];
        bad[10] = f32::NAN;
        assert!(est.estimate(&bad).is_err());
    }
}
