//! Gain staging primitives.

/*
Gain Staging
============

The capture path feeds two consumers that want different levels from the same
microphone signal:

  detection   Pitch estimation works on periodicity. A hot signal keeps the
              autocorrelation peaks well above the noise floor, so this
              branch gets a large fixed gain and is allowed to clip (the
              estimator rescales clipped windows by their peak).

  recording   A person listens to this. It keeps a natural level and must
              not start with a click.

Vocabulary
----------

  gain        A multiplier applied to amplitude.
                gain > 1.0  →  louder
                gain = 1.0  →  unchanged
                gain = 0.0  →  silence

  ramp        A gain that moves linearly from a start value to a target over
              a fixed number of samples. Starting a stream at full gain makes
              the first sample jump from 0 to wherever the waveform happens
              to be; that step is heard as a pop.


The Ramp Math
-------------

    increment = (target - start) / ramp_samples

    ramp of 30 ms at 48 kHz = 1440 samples
    target 1.0 → increment ≈ 0.000694 per sample

After `ramp_samples` samples the gain sits exactly on the target and every
further block is a plain multiply.
*/

/// Multiply a signal by a constant gain factor (in-place).
#[inline]
pub fn apply_gain(signal: &mut [f32], gain: f32) {
    for sample in signal.iter_mut() {
        *sample *= gain;
    }
}

/// Copy `input` into `out` scaled by `gain`.
#[inline]
pub fn copy_with_gain(input: &[f32], gain: f32, out: &mut [f32]) {
    debug_assert_eq!(input.len(), out.len());

    for (o, &s) in out.iter_mut().zip(input.iter()) {
        *o = s * gain;
    }
}

/// Linear gain ramp from 0 to a target value.
#[derive(Debug, Clone, Copy)]
pub struct GainRamp {
    current: f32,
    target: f32,
    increment: f32,
    remaining: usize,
}

impl GainRamp {
    /// Ramp from silence to `target` over `ramp_samples` samples.
    pub fn new(target: f32, ramp_samples: usize) -> Self {
        if ramp_samples == 0 {
            return Self::fixed(target);
        }
        Self {
            current: 0.0,
            target,
            increment: target / ramp_samples as f32,
            remaining: ramp_samples,
        }
    }

    /// A gain that is already at its target.
    pub fn fixed(target: f32) -> Self {
        Self {
            current: target,
            target,
            increment: 0.0,
            remaining: 0,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.remaining == 0
    }

    /// Scale `input` into `out`, advancing the ramp one step per sample.
    #[inline]
    pub fn process(&mut self, input: &[f32], out: &mut [f32]) {
        debug_assert_eq!(input.len(), out.len());

        if self.remaining == 0 {
            copy_with_gain(input, self.target, out);
            return;
        }

        for (o, &s) in out.iter_mut().zip(input.iter()) {
            if self.remaining > 0 {
                self.current += self.increment;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.current = self.target;
                }
            }
            *o = s * self.current;
        }
    }
}
