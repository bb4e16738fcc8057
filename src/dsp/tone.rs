//! Sine reference tone, used by the latency calibration flow.

use std::f32::consts::TAU;

/// Phase-accumulating sine oscillator.
#[derive(Debug, Clone)]
pub struct SineTone {
    phase: f32,
    increment: f32,
    amplitude: f32,
}

impl SineTone {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            increment: frequency / sample_rate,
            amplitude,
        }
    }

    /// Fill `out` with the next block of the tone.
    pub fn render(&mut self, out: &mut [f32]) {
        for o in out.iter_mut() {
            *o = (self.phase * TAU).sin() * self.amplitude;
            self.phase += self.increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

/// Generate `len` samples of a sine at `frequency`.
pub fn sine(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    let mut out = vec![0.0; len];
    SineTone::new(frequency, 1.0, sample_rate).render(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_period() {
        // 1 kHz at 48 kHz = 48 samples per period
        let s = sine(1000.0, 48_000.0, 97);
        assert!(s[0].abs() < 1e-6);
        assert!(s[48].abs() < 1e-3);
        assert!((s[12] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_amplitude_bounds() {
        let mut tone = SineTone::new(440.0, 0.25, 44_100.0);
        let mut out = [0.0; 512];
        tone.render(&mut out);
        assert!(out.iter().all(|s| s.abs() <= 0.25 + 1e-6));
    }
}
