//! Signal conditioning: one microphone source, two independent gain branches.
//!
//! ```text
//!                      ┌─► detection gain (fixed, hot) ─► estimator
//!   mic ─► downmix ────┤
//!                      └─► recording gain (ramped)     ─► recorder
//! ```
//!
//! Both branches read the same source block. Neither branch ever reads the
//! output of the other.

use crate::{
    config::DeviceProfile,
    dsp::amplify::{copy_with_gain, GainRamp},
};

/// Processing requested from the platform when opening the capture stream.
///
/// Dynamics processing is always off: compressors, noise suppressors and
/// AGC smear the harmonic structure the estimator relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub channel_count: u16,
}

impl CaptureConstraints {
    pub fn for_profile(profile: &DeviceProfile) -> Self {
        Self {
            echo_cancellation: profile.echo_cancellation,
            noise_suppression: false,
            auto_gain_control: false,
            channel_count: 1,
        }
    }
}

/// Fixed detection gain plus ramped recording gain over one source.
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    detection_gain: f32,
    recording: GainRamp,
    constraints: CaptureConstraints,
}

impl SignalConditioner {
    pub fn new(profile: &DeviceProfile, sample_rate: f32, ramp_ms: u64) -> Self {
        let ramp_samples = (sample_rate as f64 * ramp_ms as f64 / 1000.0).round() as usize;
        Self {
            detection_gain: profile.detection_gain,
            recording: GainRamp::new(profile.recording_gain, ramp_samples),
            constraints: CaptureConstraints::for_profile(profile),
        }
    }

    pub fn constraints(&self) -> CaptureConstraints {
        self.constraints
    }

    /// Fan `source` out into both branches.
    ///
    /// All three slices must have the same length.
    #[inline]
    pub fn process(&mut self, source: &[f32], detection: &mut [f32], recording: &mut [f32]) {
        copy_with_gain(source, self.detection_gain, detection);
        self.recording.process(source, recording);
    }
}
