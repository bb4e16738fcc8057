//! What the transport drives: something that can start and stop sources.

use super::buffer::AudioBuffer;
use crate::error::Result;

/// Playable sources. The two backing stems are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Instrumental,
    Guide,
    /// Saved take, review mode only
    Take,
    /// Calibration tone
    Tone,
}

impl SourceId {
    pub const ALL: [SourceId; 4] = [
        SourceId::Instrumental,
        SourceId::Guide,
        SourceId::Take,
        SourceId::Tone,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            SourceId::Instrumental => 0,
            SourceId::Guide => 1,
            SourceId::Take => 2,
            SourceId::Tone => 3,
        }
    }

    /// Backing stem for the guide-vocal flag.
    pub fn backing(guide: bool) -> Self {
        if guide {
            SourceId::Guide
        } else {
            SourceId::Instrumental
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// Nothing was sounding; not an error
    AlreadyStopped,
}

pub trait PlaybackSink {
    fn load(&mut self, id: SourceId, buffer: AudioBuffer) -> Result<()>;

    /// Start `id` at `offset_secs` into its buffer after `delay_secs` of
    /// silence. Restarting a sounding source replaces it.
    fn start(&mut self, id: SourceId, offset_secs: f64, delay_secs: f64) -> Result<()>;

    fn stop(&mut self, id: SourceId) -> StopOutcome;

    /// Free buffers the audio side no longer uses. Called every frame.
    fn reclaim(&mut self) -> usize {
        0
    }
}
