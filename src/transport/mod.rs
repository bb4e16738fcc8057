//! Backing-track playback in a single audio clock domain.

pub mod buffer;
pub mod clock;
pub mod loader;
pub mod mixer;
pub mod output;
pub mod playback;
pub mod sink;

pub use buffer::AudioBuffer;
pub use clock::{AudioClock, Clock, ManualClock, SystemClock};
pub use loader::{BufferLoader, BufferSource, BufferState, LoadRequest, LoadedBuffers};
pub use mixer::{MixerHandle, PlaybackCommand, PlaybackMixer};
pub use output::CpalOutput;
pub use playback::{PlayState, PlaybackTransport};
pub use sink::{PlaybackSink, SourceId, StopOutcome};
