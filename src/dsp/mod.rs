//! Low-level DSP primitives used by the capture and calibration paths.
//!
//! These are allocation-free and realtime-safe unless noted, so they can run
//! inside device callbacks.

/// Fixed gains and click-free gain ramps.
pub mod amplify;
/// RMS, peak, clip normalisation and downmixing.
pub mod level;
/// Reference sine tone.
pub mod tone;

pub use amplify::{apply_gain, GainRamp};
pub use level::{normalize_peak, peak, rms};
