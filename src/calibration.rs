//! Microphone latency calibration.
//!
//! A short reference tone is played through the output. The probe watches
//! the capture level and reports the time from tone start until the level
//! first crosses a threshold. That round trip becomes the microphone delay
//! subtracted from every pitch timestamp.

use std::time::Duration;

use crate::{
    dsp::tone::SineTone,
    error::{Result, TrainerError},
    store::{CalibrationStore, MicDelay},
};

pub const TONE_FREQUENCY: f32 = 1000.0;
pub const TONE_AMPLITUDE: f32 = 0.5;
pub const TONE_LENGTH: Duration = Duration::from_millis(300);
pub const DEFAULT_THRESHOLD: f32 = 0.02;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Render the reference tone at `sample_rate`.
pub fn reference_tone(sample_rate: f32) -> Vec<f32> {
    let len = (sample_rate as f64 * TONE_LENGTH.as_secs_f64()).round() as usize;
    let mut out = vec![0.0; len];
    SineTone::new(TONE_FREQUENCY, TONE_AMPLITUDE, sample_rate).render(&mut out);
    // Short fades so the tone itself does not click
    let fade = (len / 20).max(1);
    for i in 0..fade.min(len) {
        let g = i as f32 / fade as f32;
        out[i] *= g;
        out[len - 1 - i] *= g;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Listening { started: Duration },
    Measured { delay_ms: i32 },
    TimedOut,
}

/// Level-crossing round-trip detector.
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    threshold: f32,
    timeout: Duration,
    state: ProbeState,
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_TIMEOUT)
    }
}

impl LatencyProbe {
    pub fn new(threshold: f32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            state: ProbeState::Idle,
        }
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, ProbeState::Listening { .. })
    }

    /// The tone started playing at `now`.
    pub fn begin(&mut self, now: Duration) {
        log::debug!("calibration listening from {now:?}");
        self.state = ProbeState::Listening { started: now };
    }

    /// Feed the capture level observed at `now`.
    ///
    /// Returns `None` while still listening, then the measured delay or a
    /// timeout exactly once.
    pub fn feed(&mut self, level: f32, now: Duration) -> Option<Result<i32>> {
        let ProbeState::Listening { started } = self.state else {
            return None;
        };
        let elapsed = now.saturating_sub(started);

        if level >= self.threshold {
            let delay_ms = elapsed.as_millis().min(i32::MAX as u128) as i32;
            log::info!("calibration measured {delay_ms} ms (level {level:.3})");
            self.state = ProbeState::Measured { delay_ms };
            return Some(Ok(delay_ms));
        }
        if elapsed >= self.timeout {
            log::warn!("calibration tone not heard within {:?}", self.timeout);
            self.state = ProbeState::TimedOut;
            return Some(Err(TrainerError::CalibrationTimeout(self.timeout)));
        }
        None
    }
}

/// Apply a probe outcome: store and publish on success, leave everything
/// untouched on failure.
pub fn apply(
    outcome: Result<i32>,
    delay: &MicDelay,
    store: &mut dyn CalibrationStore,
) -> Result<i32> {
    let measured = outcome?;
    delay.set_ms(measured);
    let stored = delay.get_ms();
    store.save(stored)?;
    Ok(stored)
}

/// Read the persisted value into the shared delay at start-up.
pub fn restore(delay: &MicDelay, store: &dyn CalibrationStore) -> Result<()> {
    if let Some(ms) = store.load()? {
        delay.set_ms(ms);
        log::debug!("restored mic delay {ms} ms");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dsp::level::peak, store::MemoryCalibrationStore};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_measures_first_crossing() {
        let mut probe = LatencyProbe::new(0.1, ms(1000));
        assert!(probe.feed(1.0, ms(0)).is_none());

        probe.begin(ms(100));
        assert!(probe.feed(0.01, ms(150)).is_none());
        let delay = probe.feed(0.3, ms(220)).unwrap().unwrap();
        assert_eq!(delay, 120);
        assert_eq!(probe.state(), ProbeState::Measured { delay_ms: 120 });
        assert!(probe.feed(0.5, ms(300)).is_none());
    }

    #[test]
    fn test_timeout_leaves_value_unchanged() {
        let delay = MicDelay::new(75);
        let mut store = MemoryCalibrationStore::new(Some(75));
        let mut probe = LatencyProbe::new(0.1, ms(500));
        probe.begin(ms(0));
        assert!(probe.feed(0.0, ms(499)).is_none());
        let outcome = probe.feed(0.0, ms(500)).unwrap();

        let err = apply(outcome, &delay, &mut store).unwrap_err();
        assert!(matches!(err, TrainerError::CalibrationTimeout(_)));
        assert_eq!(delay.get_ms(), 75);
        assert_eq!(store.load().unwrap(), Some(75));
    }

    #[test]
    fn test_success_is_published_and_stored() {
        let delay = MicDelay::new(0);
        let mut store = MemoryCalibrationStore::default();
        assert_eq!(apply(Ok(140), &delay, &mut store).unwrap(), 140);
        assert_eq!(delay.get_ms(), 140);

        let restored = MicDelay::new(0);
        restore(&restored, &store).unwrap();
        assert_eq!(restored.get_ms(), 140);
    }

    #[test]
    fn test_reference_tone_shape() {
        let tone = reference_tone(48_000.0);
        assert_eq!(tone.len(), 14_400);
        assert!(tone[0].abs() < 1e-6);
        assert!(peak(&tone) <= TONE_AMPLITUDE + 1e-6);
        assert!(peak(&tone) > TONE_AMPLITUDE * 0.9);
    }
}
