//! Error taxonomy for the trainer.
//!
//! User-actionable failures (permission, decode, calibration) surface to the
//! caller and are retried only by an explicit user action. Estimation errors
//! never leave the compute stage: the worker logs them and reports silence.

use std::time::Duration;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, TrainerError>;

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    /// Capture device access was denied by the platform or the user.
    #[error("microphone permission denied: {0}")]
    Permission(String),

    /// No capture or playback device is present.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A backing track or take recording failed to decode.
    #[error("failed to decode `{source_name}`: {reason}")]
    Decode { source_name: String, reason: String },

    /// Decoding did not finish within the configured timeout.
    #[error("decoding `{source_name}` timed out after {timeout:?}")]
    DecodeTimeout {
        source_name: String,
        timeout: Duration,
    },

    /// The calibration tone was never heard on the capture path.
    #[error("calibration tone not detected within {0:?}")]
    CalibrationTimeout(Duration),

    /// A sample batch reaching the compute stage was malformed.
    #[error("malformed analysis window: {0}")]
    Estimation(String),

    /// A transport operation needs buffers that are not loaded yet.
    #[error("playback buffers are not loaded")]
    NotLoaded,

    /// Building or starting a device stream failed.
    #[error("audio stream error: {0}")]
    Stream(String),

    /// Invalid configuration value.
    #[error("invalid configuration `{name}`: {reason}")]
    Config { name: &'static str, reason: String },

    /// The single-slot store rejected a read or write.
    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrainerError {
    /// Whether the error is recovered by the user retrying the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrainerError::Permission(_)
                | TrainerError::Decode { .. }
                | TrainerError::DecodeTimeout { .. }
                | TrainerError::CalibrationTimeout(_)
                | TrainerError::DeviceUnavailable(_)
        )
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for TrainerError {
    fn from(err: serde_json::Error) -> Self {
        TrainerError::Store(err.to_string())
    }
}
