//! Configuration: device classes, per-device signal constants and timing.
//!
//! The device class is resolved once per session and passed down. Nothing
//! downstream inspects the platform again.

use std::{str::FromStr, time::Duration};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::TrainerError;

/// Coarse device category that selects microphone constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DeviceClass {
    Desktop,
    /// Handsets whose loudspeaker sits next to the microphone (needs AEC)
    MobileA,
    /// Handsets with a weak raw capture signal
    MobileB,
}

impl DeviceClass {
    /// Classify a platform identifier string (e.g. a user-agent).
    pub fn from_user_agent(ua: &str) -> Self {
        let ua = ua.to_ascii_lowercase();
        if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
            DeviceClass::MobileA
        } else if ua.contains("android") {
            DeviceClass::MobileB
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn is_mobile(self) -> bool {
        !matches!(self, DeviceClass::Desktop)
    }
}

impl FromStr for DeviceClass {
    type Err = TrainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(DeviceClass::Desktop),
            "mobile-a" | "mobile_a" | "mobilea" => Ok(DeviceClass::MobileA),
            "mobile-b" | "mobile_b" | "mobileb" => Ok(DeviceClass::MobileB),
            other => Err(TrainerError::Config {
                name: "device",
                reason: format!("unknown device class `{other}`"),
            }),
        }
    }
}

/// Signal constants for one device class.
///
/// These were tuned by ear on real hardware. Treat them as a starting point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceProfile {
    /// Fixed gain on the detection branch
    pub detection_gain: f32,
    /// Target gain on the recording branch (reached after the ramp)
    pub recording_gain: f32,
    /// Windows with RMS below this are silence
    pub rms_threshold: f32,
    /// Minimum NSDF clarity (0..1) to accept an estimate
    pub clarity_threshold: f32,
    /// Ask the platform for echo cancellation on the capture stream
    pub echo_cancellation: bool,
}

impl DeviceProfile {
    pub const DESKTOP: DeviceProfile = DeviceProfile {
        detection_gain: 4.0,
        recording_gain: 1.0,
        rms_threshold: 0.01,
        clarity_threshold: 0.8,
        echo_cancellation: false,
    };

    pub const MOBILE_A: DeviceProfile = DeviceProfile {
        detection_gain: 10.0,
        recording_gain: 2.0,
        rms_threshold: 0.004,
        clarity_threshold: 0.75,
        echo_cancellation: true,
    };

    pub const MOBILE_B: DeviceProfile = DeviceProfile {
        detection_gain: 6.0,
        recording_gain: 1.5,
        rms_threshold: 0.005,
        clarity_threshold: 0.7,
        echo_cancellation: false,
    };

    /// Compiled-in default for a class.
    pub fn for_class(class: DeviceClass) -> Self {
        match class {
            DeviceClass::Desktop => Self::DESKTOP,
            DeviceClass::MobileA => Self::MOBILE_A,
            DeviceClass::MobileB => Self::MOBILE_B,
        }
    }
}

/// Estimator tuning shared by all device classes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimatorConfig {
    /// Analysis window length in samples (power of two)
    pub window_len: usize,
    /// New samples required between two estimates
    pub hop_len: usize,
    /// Lowest accepted semitone (C2)
    pub min_semitone: i32,
    /// Highest accepted semitone (C6)
    pub max_semitone: i32,
    /// Trailing median length
    pub median_len: usize,
    /// A step of this many semitones or more from the stable value is rejected
    pub max_jump: i32,
    /// Consecutive jump rejections after which the new value is trusted
    pub jump_reset_after: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            window_len: 2048,
            hop_len: 512,
            min_semitone: 36,
            max_semitone: 84,
            median_len: 3,
            max_jump: 10,
            jump_reset_after: 4,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainerConfig {
    pub desktop: DeviceProfile,
    pub mobile_a: DeviceProfile,
    pub mobile_b: DeviceProfile,
    pub estimator: EstimatorConfig,
    /// Pitch event cadence in milliseconds
    pub emit_interval_ms: u64,
    /// Recording gain ramp length in milliseconds
    pub record_ramp_ms: u64,
    /// Per-buffer decode timeout in seconds
    pub decode_timeout_secs: u64,
    /// Correction added to every melody timestamp and the bar anchor
    pub melody_offset_ms: f64,
    /// Preferred recording containers, most preferred first
    pub recording_formats: Vec<crate::capture::RecordingFormat>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            desktop: DeviceProfile::DESKTOP,
            mobile_a: DeviceProfile::MOBILE_A,
            mobile_b: DeviceProfile::MOBILE_B,
            estimator: EstimatorConfig::default(),
            emit_interval_ms: 20,
            record_ramp_ms: 30,
            decode_timeout_secs: 30,
            melody_offset_ms: 0.0,
            recording_formats: crate::capture::RecordingFormat::PREFERENCE.to_vec(),
        }
    }
}

impl TrainerConfig {
    /// Profile for a resolved device class.
    pub fn profile(&self, class: DeviceClass) -> DeviceProfile {
        match class {
            DeviceClass::Desktop => self.desktop,
            DeviceClass::MobileA => self.mobile_a,
            DeviceClass::MobileB => self.mobile_b,
        }
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        let window = self.estimator.window_len;
        if window < 64 || !window.is_power_of_two() {
            return Err(TrainerError::Config {
                name: "estimator.window_len",
                reason: format!("{window} is not a power of two >= 64"),
            });
        }
        if self.estimator.hop_len == 0 || self.estimator.hop_len > window {
            return Err(TrainerError::Config {
                name: "estimator.hop_len",
                reason: format!("must be in 1..={window}"),
            });
        }
        if self.estimator.median_len == 0 {
            return Err(TrainerError::Config {
                name: "estimator.median_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.estimator.min_semitone >= self.estimator.max_semitone {
            return Err(TrainerError::Config {
                name: "estimator.min_semitone",
                reason: "must be below max_semitone".to_string(),
            });
        }
        if self.emit_interval_ms == 0 {
            return Err(TrainerError::Config {
                name: "emit_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.recording_formats.is_empty() {
            return Err(TrainerError::Config {
                name: "recording_formats",
                reason: "at least one format is required".to_string(),
            });
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: TrainerConfig =
            serde_json::from_str(&text).map_err(|e| TrainerError::Config {
                name: "file",
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_classification() {
        assert_eq!(
            DeviceClass::from_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"),
            DeviceClass::MobileA
        );
        assert_eq!(
            DeviceClass::from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            DeviceClass::MobileB
        );
        assert_eq!(
            DeviceClass::from_user_agent("Mozilla/5.0 (X11; Linux x86_64)"),
            DeviceClass::Desktop
        );
    }

    #[test]
    fn test_parse_device_class() {
        assert_eq!("mobile-a".parse::<DeviceClass>().unwrap(), DeviceClass::MobileA);
        assert_eq!("Desktop".parse::<DeviceClass>().unwrap(), DeviceClass::Desktop);
        assert!("tablet".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn test_only_one_class_uses_echo_cancellation() {
        let config = TrainerConfig::default();
        let with_aec: Vec<_> = [DeviceClass::Desktop, DeviceClass::MobileA, DeviceClass::MobileB]
            .into_iter()
            .filter(|&c| config.profile(c).echo_cancellation)
            .collect();
        assert_eq!(with_aec, vec![DeviceClass::MobileA]);
    }

    #[test]
    fn test_mobile_gates_are_lower() {
        let config = TrainerConfig::default();
        let desktop = config.profile(DeviceClass::Desktop).rms_threshold;
        assert!(config.profile(DeviceClass::MobileA).rms_threshold < desktop);
        assert!(config.profile(DeviceClass::MobileB).rms_threshold < desktop);
    }

    #[test]
    fn test_validate_rejects_odd_window() {
        let mut config = TrainerConfig::default();
        assert!(config.validate().is_ok());
        config.estimator.window_len = 1000;
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TrainerConfig =
            serde_json::from_str(r#"{ "emit_interval_ms": 25 }"#).unwrap();
        assert_eq!(config.emit_interval_ms, 25);
        assert_eq!(config.desktop, DeviceProfile::DESKTOP);
    }
}
