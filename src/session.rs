//! One practice session: transport, capture, timeline and scoring wired
//! together, driven by the front end's frame loop.
//!
//! A take ends either because the user stops it or because playback
//! reaches the end. Both paths go through one finalize routine guarded by
//! an atomic "was active" flag, so only the first caller resolves the
//! recording and builds the score.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crate::{
    calibration::{reference_tone, LatencyProbe},
    capture::{CapturePipeline, InputBackend},
    error::{Result, TrainerError},
    lyrics::Lyrics,
    melody::Melody,
    scoring::ScoreResult,
    store::{SavedTake, TakeStore},
    timeline::{PitchSample, PitchTimeline},
    transport::{
        AudioBuffer, BufferSource, BufferState, Clock, LoadRequest, PlaybackSink,
        PlaybackTransport,
    },
};

/// Sample rate the calibration tone is rendered at; the mixer resamples.
const TONE_RATE: u32 = 48_000;

#[derive(Debug)]
pub enum SessionEvent {
    /// A take finished (user stop or end of song)
    TakeFinished(ScoreResult),
    /// Calibration resolved with a delay or a timeout
    Calibration(Result<i32>),
}

pub struct TakeSession<C: Clock, S: PlaybackSink, B: InputBackend> {
    transport: PlaybackTransport<C, S>,
    capture: CapturePipeline<B>,
    melody: Melody,
    lyrics: Lyrics,
    timeline: PitchTimeline,
    active: AtomicBool,
    recording_offset_ms: f64,
    emit_interval_ms: f64,
    last_result: Option<ScoreResult>,
    review: Option<SavedTake>,
    probe: Option<LatencyProbe>,
}

impl<C: Clock, S: PlaybackSink, B: InputBackend> TakeSession<C, S, B> {
    pub fn new(
        mut transport: PlaybackTransport<C, S>,
        capture: CapturePipeline<B>,
        melody: Melody,
        lyrics: Lyrics,
        emit_interval: Duration,
    ) -> Self {
        transport.set_total_duration_ms(melody.total_duration_ms);
        let emit_interval_ms = emit_interval.as_secs_f64() * 1000.0;
        Self {
            transport,
            capture,
            timeline: PitchTimeline::with_capacity_for(melody.total_duration_ms, emit_interval_ms),
            melody,
            lyrics,
            active: AtomicBool::new(false),
            recording_offset_ms: 0.0,
            emit_interval_ms,
            last_result: None,
            review: None,
            probe: None,
        }
    }

    pub fn transport(&self) -> &PlaybackTransport<C, S> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut PlaybackTransport<C, S> {
        &mut self.transport
    }

    pub fn capture(&self) -> &CapturePipeline<B> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CapturePipeline<B> {
        &mut self.capture
    }

    pub fn melody(&self) -> &Melody {
        &self.melody
    }

    pub fn lyrics(&self) -> &Lyrics {
        &self.lyrics
    }

    pub fn timeline(&self) -> &PitchTimeline {
        &self.timeline
    }

    pub fn emit_interval_ms(&self) -> f64 {
        self.emit_interval_ms
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_calibrating(&self) -> bool {
        self.probe.is_some()
    }

    pub fn last_result(&self) -> Option<&ScoreResult> {
        self.last_result.as_ref()
    }

    pub fn review(&self) -> Option<&SavedTake> {
        self.review.as_ref()
    }

    /// Samples to draw: the saved take in review mode, else the live take.
    pub fn display_samples(&self) -> &[PitchSample] {
        match &self.review {
            Some(take) => &take.timeline,
            None => self.timeline.samples(),
        }
    }

    /// Load backing tracks for practice (leaves review mode).
    pub fn load(&mut self, instrumental: BufferSource, guide: Option<BufferSource>) -> bool {
        self.review = None;
        self.transport.set_take_offset_ms(0.0);
        self.transport.start_loading(LoadRequest {
            instrumental,
            guide,
            take: None,
        })
    }

    /// Start a take: open capture, then play from the top.
    pub fn start_take(&mut self) -> Result<()> {
        if self.is_active() {
            log::debug!("take already running");
            return Ok(());
        }
        if self.review.is_some() {
            return Err(TrainerError::Config {
                name: "session",
                reason: "leave review mode before recording".into(),
            });
        }
        if self.transport.buffer_state() != BufferState::Loaded {
            return Err(TrainerError::NotLoaded);
        }
        if self.probe.is_some() {
            self.cancel_calibration();
        }

        self.timeline.clear();
        let transport = &self.transport;
        let capture_started = self.capture.start(|| transport.now())?;
        if let Err(err) = self.transport.play_from_start() {
            self.capture.stop();
            return Err(err);
        }
        let playback_started = self.transport.now();
        self.recording_offset_ms = signed_ms(capture_started, playback_started);

        self.active.store(true, Ordering::Release);
        log::info!("take started (recording offset {:.1} ms)", self.recording_offset_ms);
        Ok(())
    }

    /// User stop. Returns the score unless another path already finished.
    pub fn stop_take(&mut self) -> Option<ScoreResult> {
        self.finalize()
    }

    fn finalize(&mut self) -> Option<ScoreResult> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return None;
        }
        let duration_ms = self.transport.position_ms();
        self.transport.pause();
        let recording = self.capture.stop();

        // Samples still staged belong to this take
        self.timeline.commit();
        let result = ScoreResult::new(
            self.timeline.snapshot(),
            &self.melody.notes,
            recording,
            duration_ms,
            self.recording_offset_ms,
        );
        log::info!(
            "take finished: {}% ({} of {} comparable samples)",
            result.percentage,
            result.tally.matched,
            result.tally.total
        );
        self.last_result = Some(result.clone());
        Some(result)
    }

    /// One frame of work. Cheap; call at display rate.
    pub fn poll(&mut self) -> Option<SessionEvent> {
        self.transport.poll_loading();
        let now = self.transport.now();

        if let Some(probe) = self.probe.as_mut() {
            if let Some(outcome) = probe.feed(self.capture.input_level(), now) {
                self.probe = None;
                self.capture.stop();
                return Some(SessionEvent::Calibration(outcome));
            }
            return None;
        }

        if self.is_active() {
            let position = self.transport.position_ms();
            if let Some(sample) = self.capture.poll(now, position) {
                self.timeline.stage(sample);
            }
            self.timeline.commit();
        }

        if self.transport.poll_ended() && self.is_active() {
            return self.finalize().map(SessionEvent::TakeFinished);
        }
        None
    }

    /// Save the last result to the single slot. Never called implicitly.
    pub fn save(&self, store: &mut dyn TakeStore) -> Result<bool> {
        let Some(result) = &self.last_result else {
            return Ok(false);
        };
        store.put(SavedTake::from(result))?;
        Ok(true)
    }

    /// Play back a saved take over the backing track it was sung to.
    pub fn enter_review(
        &mut self,
        take: SavedTake,
        instrumental: BufferSource,
        guide: Option<BufferSource>,
    ) -> Result<bool> {
        if self.is_active() {
            self.finalize();
        }
        let recording = take.recording.clone().ok_or_else(|| TrainerError::Store(
            "saved take has no recording".into(),
        ))?;
        self.transport.set_take_offset_ms(take.recording_offset_ms);
        let started = self.transport.start_loading(LoadRequest {
            instrumental,
            guide,
            take: Some(BufferSource::Recording(recording)),
        });
        log::info!("reviewing saved take ({}%)", take.score);
        self.review = Some(take);
        Ok(started)
    }

    /// Measure the microphone round trip with a reference tone.
    pub fn start_calibration(&mut self, probe: LatencyProbe) -> Result<()> {
        if self.is_active() {
            return Err(TrainerError::Config {
                name: "session",
                reason: "stop the take before calibrating".into(),
            });
        }
        let transport = &self.transport;
        self.capture.start(|| transport.now())?;
        let tone = AudioBuffer::new(reference_tone(TONE_RATE as f32), 1, TONE_RATE);
        let started = match self.transport.play_tone(tone) {
            Ok(started) => started,
            Err(err) => {
                self.capture.stop();
                return Err(err);
            }
        };
        let mut probe = probe;
        probe.begin(started);
        self.probe = Some(probe);
        Ok(())
    }

    pub fn cancel_calibration(&mut self) {
        if self.probe.take().is_some() {
            self.capture.stop();
        }
    }
}

/// `a - b` in milliseconds, signed.
fn signed_ms(a: Duration, b: Duration) -> f64 {
    a.as_secs_f64() * 1000.0 - b.as_secs_f64() * 1000.0
}
