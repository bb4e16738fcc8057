//! Seam between the capture pipeline and the platform's input device.

use crate::{conditioner::CaptureConstraints, error::Result};

use super::recorder::RecordingFormat;

/// Answer from a platform permission-status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Not decided yet; opening a stream will ask the user
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Interleaved f32 input callback, run on the device's realtime thread.
pub type InputCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// An open capture stream. Dropping it also releases the device.
pub trait InputStream {
    fn close(self: Box<Self>);
}

pub trait InputBackend {
    /// Permission state if the platform can report it without prompting.
    fn query_permission(&self) -> Option<PermissionStatus>;

    /// Trigger the platform permission prompt by opening and immediately
    /// releasing a stream.
    fn prompt_permission(&mut self) -> Result<()>;

    fn input_format(&self) -> Result<InputFormat>;

    /// Containers this platform can play back a take from.
    fn supported_recording_formats(&self) -> Vec<RecordingFormat>;

    /// Acquire a fresh stream with the given constraints.
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        callback: InputCallback,
    ) -> Result<Box<dyn InputStream>>;
}
