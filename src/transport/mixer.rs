//! Output-callback renderer for the playback sources.
//!
//! Commands arrive over an `rtrb` ring and are applied at the top of each
//! callback. After rendering, the frame count advances the [`AudioClock`],
//! so transport position follows what was actually rendered.
//!
//! Buffers replaced by a new load go back to the control side over a second
//! ring, so the callback never frees track memory.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use super::{
    buffer::AudioBuffer,
    clock::AudioClock,
    sink::{PlaybackSink, SourceId, StopOutcome},
};
use crate::error::{Result, TrainerError};

/*
Rate Conversion
===============

A decoded file keeps its own sample rate. The output device runs at another.
Each voice walks its buffer with a fractional read position:

  step = buffer_rate / output_rate

and reads between two neighbouring frames with linear interpolation:

  y = x[i] + (x[i + 1] - x[i]) * frac

Cheap and fixed-cost per frame. It rolls off a little treble when
downsampling, which a backing track can live with.
*/

const COMMAND_RING_LEN: usize = 64;
/// One displaced buffer per queued load, plus the one still in a voice.
const RETURN_RING_LEN: usize = COMMAND_RING_LEN + 1;

#[derive(Debug, Clone)]
pub enum PlaybackCommand {
    Load { id: SourceId, buffer: AudioBuffer },
    Start {
        id: SourceId,
        offset_secs: f64,
        delay_secs: f64,
    },
    Stop { id: SourceId },
}

#[derive(Debug, Default, Clone)]
struct Voice {
    buffer: Option<AudioBuffer>,
    position: f64,
    step: f64,
    delay_frames: u64,
    playing: bool,
}

impl Voice {
    fn start(&mut self, offset_secs: f64, delay_secs: f64, output_rate: u32) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        self.position = (offset_secs * f64::from(buffer.sample_rate())).max(0.0);
        self.step = f64::from(buffer.sample_rate()) / f64::from(output_rate.max(1));
        self.delay_frames = (delay_secs.max(0.0) * f64::from(output_rate)).round() as u64;
        self.playing = self.position < buffer.frames() as f64;
    }

    /// Mix this voice into `out` (interleaved, `channels` wide).
    fn render_into(&mut self, out: &mut [f32], channels: usize) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        if !self.playing {
            return;
        }
        let frames = buffer.frames();
        for frame in out.chunks_exact_mut(channels) {
            if self.delay_frames > 0 {
                self.delay_frames -= 1;
                continue;
            }
            let index = self.position as usize;
            if index >= frames {
                self.playing = false;
                break;
            }
            let frac = (self.position - index as f64) as f32;
            for (ch, sample) in frame.iter_mut().enumerate() {
                let a = buffer.sample(index, ch);
                let b = buffer.sample(index + 1, ch);
                *sample += a + (b - a) * frac;
            }
            self.position += self.step;
        }
    }
}

pub struct PlaybackMixer {
    rx: Consumer<PlaybackCommand>,
    returned: Producer<AudioBuffer>,
    voices: [Voice; 4],
    sample_rate: u32,
    channels: usize,
    clock: AudioClock,
}

impl PlaybackMixer {
    /// Build the renderer and the control-side handle that feeds it.
    pub fn new(sample_rate: u32, channels: usize, clock: AudioClock) -> (Self, MixerHandle) {
        let (tx, rx) = RingBuffer::new(COMMAND_RING_LEN);
        let (returned, spent) = RingBuffer::new(RETURN_RING_LEN);
        let mixer = Self {
            rx,
            returned,
            voices: Default::default(),
            sample_rate,
            channels: channels.max(1),
            clock,
        };
        let handle = MixerHandle {
            tx,
            spent,
            sounding: [false; 4],
        };
        (mixer, handle)
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.rx.pop() {
            match command {
                PlaybackCommand::Load { id, buffer } => {
                    let voice = &mut self.voices[id.index()];
                    voice.playing = false;
                    if let Some(old) = voice.buffer.replace(buffer) {
                        if let Err(PushError::Full(old)) = self.returned.push(old) {
                            // Unreachable while the handle drains before each send
                            voice.buffer = Some(old);
                        }
                    }
                }
                PlaybackCommand::Start {
                    id,
                    offset_secs,
                    delay_secs,
                } => self.voices[id.index()].start(offset_secs, delay_secs, self.sample_rate),
                PlaybackCommand::Stop { id } => self.voices[id.index()].playing = false,
            }
        }
    }

    /// Render one interleaved output buffer.
    pub fn render(&mut self, out: &mut [f32]) {
        self.apply_commands();
        out.fill(0.0);
        for voice in &mut self.voices {
            voice.render_into(out, self.channels);
        }
        self.clock.advance((out.len() / self.channels) as u64);
    }

    pub fn is_playing(&self, id: SourceId) -> bool {
        self.voices[id.index()].playing
    }
}

/// Control-side [`PlaybackSink`] for a [`PlaybackMixer`].
pub struct MixerHandle {
    tx: Producer<PlaybackCommand>,
    spent: Consumer<AudioBuffer>,
    sounding: [bool; 4],
}

impl MixerHandle {
    fn send(&mut self, command: PlaybackCommand) -> Result<()> {
        self.reclaim();
        self.tx
            .push(command)
            .map_err(|_| TrainerError::Stream("playback command queue full".into()))
    }
}

impl PlaybackSink for MixerHandle {
    fn load(&mut self, id: SourceId, buffer: AudioBuffer) -> Result<()> {
        self.sounding[id.index()] = false;
        self.send(PlaybackCommand::Load { id, buffer })
    }

    fn start(&mut self, id: SourceId, offset_secs: f64, delay_secs: f64) -> Result<()> {
        self.send(PlaybackCommand::Start {
            id,
            offset_secs,
            delay_secs,
        })?;
        self.sounding[id.index()] = true;
        Ok(())
    }

    /// Free buffers the renderer has let go of. Returns how many.
    fn reclaim(&mut self) -> usize {
        let mut freed = 0;
        while let Ok(buffer) = self.spent.pop() {
            drop(buffer);
            freed += 1;
        }
        freed
    }

    fn stop(&mut self, id: SourceId) -> StopOutcome {
        if !std::mem::take(&mut self.sounding[id.index()]) {
            return StopOutcome::AlreadyStopped;
        }
        if let Err(err) = self.send(PlaybackCommand::Stop { id }) {
            log::warn!("stop {id:?}: {err}");
        }
        StopOutcome::Stopped
    }
}
