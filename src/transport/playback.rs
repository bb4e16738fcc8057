//! Playback transport: start, pause, resume and seek of the backing stems.
//!
//! Position is never tracked with timers. Every transition records an
//! offset, and while playing the position is
//!
//!   offset + (clock.now() - started_at)
//!
//! read from the same clock that renders the audio.

use std::time::Duration;

use super::{
    buffer::AudioBuffer,
    clock::Clock,
    loader::{BufferLoader, BufferState, LoadRequest, LoadedBuffers},
    sink::{PlaybackSink, SourceId, StopOutcome},
};
use crate::error::{Result, TrainerError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayState {
    Stopped,
    Playing { started_at: Duration },
}

pub struct PlaybackTransport<C: Clock, S: PlaybackSink> {
    clock: C,
    sink: S,
    loader: BufferLoader,
    loaded: bool,
    total_duration_ms: f64,
    offset_secs: f64,
    state: PlayState,
    guide_active: bool,
    has_guide: bool,
    has_take: bool,
    /// Capture start minus playback start of the reviewed take
    take_offset_ms: f64,
}

impl<C: Clock, S: PlaybackSink> PlaybackTransport<C, S> {
    pub fn new(clock: C, sink: S, decode_timeout: Duration) -> Self {
        Self {
            clock,
            sink,
            loader: BufferLoader::new(decode_timeout),
            loaded: false,
            total_duration_ms: 0.0,
            offset_secs: 0.0,
            state: PlayState::Stopped,
            guide_active: false,
            has_guide: false,
            has_take: false,
            take_offset_ms: 0.0,
        }
    }

    /// Song length; 0 means "use the instrumental buffer's length".
    pub fn set_total_duration_ms(&mut self, ms: f64) {
        self.total_duration_ms = ms.max(0.0);
    }

    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ms
    }

    /// Record-start lag of the take played in review mode.
    pub fn set_take_offset_ms(&mut self, ms: f64) {
        self.take_offset_ms = ms;
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Begin decoding. Ignored while a load is already in flight.
    pub fn start_loading(&mut self, request: LoadRequest) -> bool {
        if self.loader.state() == BufferState::Loading {
            log::debug!("load already in flight");
            return false;
        }
        if self.is_playing() {
            self.pause();
        }
        self.loaded = false;
        self.loader.start_loading(request)
    }

    pub fn buffer_state(&self) -> BufferState {
        self.loader.state()
    }

    pub fn load_error(&self) -> Option<&TrainerError> {
        self.loader.error()
    }

    /// Non-blocking; installs buffers when the load resolves.
    pub fn poll_loading(&mut self) -> BufferState {
        self.sink.reclaim();
        if let Some(buffers) = self.loader.poll() {
            self.install(buffers);
        }
        self.loader.state()
    }

    /// Block until the load resolves.
    pub fn wait_loading(&mut self) -> BufferState {
        if let Some(buffers) = self.loader.wait() {
            self.install(buffers);
        }
        self.loader.state()
    }

    /// Discard an in-flight load, e.g. on teardown.
    pub fn cancel_loading(&mut self) {
        self.loader.cancel();
    }

    fn install(&mut self, buffers: LoadedBuffers) {
        let LoadedBuffers {
            instrumental,
            guide,
            take,
        } = buffers;
        if self.total_duration_ms <= 0.0 {
            self.total_duration_ms = instrumental.duration_ms();
        }
        self.has_guide = guide.is_some();
        self.has_take = take.is_some();
        if !self.has_guide {
            self.guide_active = false;
        }

        let sources = [
            (SourceId::Instrumental, Some(instrumental)),
            (SourceId::Guide, guide),
            (SourceId::Take, take),
        ];
        for (id, buffer) in sources {
            if let Some(buffer) = buffer {
                if let Err(err) = self.sink.load(id, buffer) {
                    log::error!("loading {id:?} into the sink: {err}");
                }
            }
        }
        self.loaded = true;
        self.offset_secs = 0.0;
        log::info!(
            "buffers loaded: {:.1} s, guide {}, review take {}",
            self.total_duration_ms / 1000.0,
            self.has_guide,
            self.has_take
        );
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing { .. })
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn guide_active(&self) -> bool {
        self.guide_active
    }

    pub fn has_guide(&self) -> bool {
        self.has_guide
    }

    pub fn is_reviewing(&self) -> bool {
        self.has_take
    }

    fn position_secs(&self) -> f64 {
        let raw = match self.state {
            PlayState::Stopped => self.offset_secs,
            PlayState::Playing { started_at } => {
                self.offset_secs + self.clock.now().saturating_sub(started_at).as_secs_f64()
            }
        };
        if self.total_duration_ms > 0.0 {
            raw.min(self.total_duration_ms / 1000.0)
        } else {
            raw
        }
    }

    /// Current playback position. Cheap and side-effect free.
    pub fn position_ms(&self) -> f64 {
        self.position_secs() * 1000.0
    }

    fn stop_sources(&mut self) {
        for id in [SourceId::Instrumental, SourceId::Guide, SourceId::Take] {
            if self.sink.stop(id) == StopOutcome::AlreadyStopped {
                log::trace!("{id:?} already stopped");
            }
        }
    }

    /// Stop everything, then start exactly one backing stem at `offset_secs`
    /// (plus the take in review mode).
    fn start_at(&mut self, offset_secs: f64, guide: bool) -> Result<()> {
        if !self.loaded {
            return Err(TrainerError::NotLoaded);
        }
        self.stop_sources();
        self.offset_secs = offset_secs;
        self.state = PlayState::Stopped;

        self.sink.start(SourceId::backing(guide), offset_secs, 0.0)?;
        if self.has_take {
            // A take that started recording late is started that much later
            let take_pos = offset_secs - self.take_offset_ms / 1000.0;
            if take_pos >= 0.0 {
                self.sink.start(SourceId::Take, take_pos, 0.0)?;
            } else {
                self.sink.start(SourceId::Take, 0.0, -take_pos)?;
            }
        }
        self.state = PlayState::Playing {
            started_at: self.clock.now(),
        };
        log::debug!(
            "playing {:?} from {:.3} s",
            SourceId::backing(guide),
            offset_secs
        );
        Ok(())
    }

    pub fn play_from_start(&mut self) -> Result<()> {
        self.start_at(0.0, self.guide_active)
    }

    /// Resume from the stored offset. No-op while playing.
    pub fn play(&mut self) -> Result<()> {
        if self.is_playing() {
            return Ok(());
        }
        self.start_at(self.offset_secs, self.guide_active)
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        let position = self.position_secs();
        self.stop_sources();
        self.offset_secs = position;
        self.state = PlayState::Stopped;
        log::debug!("paused at {position:.3} s");
    }

    /// Move to `ms`, clamped to the song. Play state is preserved.
    pub fn seek_to_ms(&mut self, ms: f64) -> Result<()> {
        let upper = if self.total_duration_ms > 0.0 {
            self.total_duration_ms
        } else {
            f64::MAX
        };
        let target = ms.clamp(0.0, upper) / 1000.0;
        if self.is_playing() {
            self.start_at(target, self.guide_active)
        } else {
            self.offset_secs = target;
            Ok(())
        }
    }

    /// Switch between instrumental and guide vocal at the same position.
    ///
    /// The next flag value is computed first and handed to the restart, so
    /// the restart never observes the old value. Returns the new flag.
    pub fn toggle_guide_vocal(&mut self) -> Result<bool> {
        if !self.has_guide {
            log::debug!("no guide vocal loaded");
            return Ok(self.guide_active);
        }
        let position = self.position_secs();
        let was_playing = self.is_playing();
        let next = !self.guide_active;

        self.stop_sources();
        self.state = PlayState::Stopped;
        self.offset_secs = position;
        self.guide_active = next;

        if was_playing {
            self.start_at(position, next)?;
        }
        Ok(next)
    }

    /// Report the source-ended event once, when playback reaches the end.
    pub fn poll_ended(&mut self) -> bool {
        if !self.is_playing() || self.total_duration_ms <= 0.0 {
            return false;
        }
        if self.position_ms() < self.total_duration_ms {
            return false;
        }
        self.stop_sources();
        self.offset_secs = self.total_duration_ms / 1000.0;
        self.state = PlayState::Stopped;
        log::info!("playback reached the end");
        true
    }

    /// Play a one-shot buffer (the calibration tone) over whatever is
    /// sounding. Returns the clock reading at start.
    pub fn play_tone(&mut self, tone: AudioBuffer) -> Result<Duration> {
        self.sink.stop(SourceId::Tone);
        self.sink.load(SourceId::Tone, tone)?;
        self.sink.start(SourceId::Tone, 0.0, 0.0)?;
        Ok(self.clock.now())
    }
}
