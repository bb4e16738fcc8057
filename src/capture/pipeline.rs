//! Capture pipeline: one permission-checked stream feeding pitch events and
//! a recording.
//!
//! ```text
//!   device callback ──► InputRouter ──┬─► rtrb<SampleBlock> ─► AnalysisWorker ─► rtrb<FrameEstimate>
//!   (realtime)                        │                                              │
//!                                     └─► rtrb<f32> ─► Recorder              PitchEmitter (poll)
//! ```
//!
//! The pipeline owns the stream and everything derived from it for the
//! duration of one take.

use std::{sync::Arc, time::Duration};

use rtrb::RingBuffer;

use super::{
    backend::{InputBackend, InputStream, PermissionStatus},
    emitter::PitchEmitter,
    recorder::{AudioBlob, Recorder, RecordingFormat},
    router::{InputRouter, RouterStats, SampleBlock, BLOCK_LEN},
    worker::{AnalysisWorker, FrameEstimate},
};
use crate::{
    conditioner::SignalConditioner,
    config::{DeviceClass, DeviceProfile, TrainerConfig},
    error::{Result, TrainerError},
    pitch::PitchEstimator,
    store::MicDelay,
    timeline::PitchSample,
};

/// Seconds of recording the ring holds between two polls.
const RECORD_RING_SECS: usize = 4;
/// Seconds of detection blocks the ring holds if the worker stalls.
const ANALYSIS_RING_SECS: usize = 1;
const RESULT_RING_LEN: usize = 64;

pub type ErrorCallback = Box<dyn FnMut(&TrainerError) + Send>;

struct ActiveCapture {
    stream: Box<dyn InputStream>,
    worker: AnalysisWorker,
    emitter: PitchEmitter,
    recorder: Recorder,
    stats: Arc<RouterStats>,
    started_at: Duration,
}

pub struct CapturePipeline<B: InputBackend> {
    backend: B,
    config: TrainerConfig,
    profile: DeviceProfile,
    delay: MicDelay,
    on_error: Option<ErrorCallback>,
    active: Option<ActiveCapture>,
}

impl<B: InputBackend> CapturePipeline<B> {
    pub fn new(backend: B, config: TrainerConfig, class: DeviceClass, delay: MicDelay) -> Self {
        let profile = config.profile(class);
        log::debug!("capture pipeline for {class:?}: {profile:?}");
        Self {
            backend,
            config,
            profile,
            delay,
            on_error: None,
            active: None,
        }
    }

    /// Register the callback that receives permission and stream failures.
    pub fn on_error(&mut self, callback: impl FnMut(&TrainerError) + Send + 'static) {
        self.on_error = Some(Box::new(callback));
    }

    fn report(&mut self, err: &TrainerError) {
        log::warn!("capture: {err}");
        if let Some(callback) = self.on_error.as_mut() {
            callback(err);
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Best-effort pre-authorisation.
    ///
    /// A definitive status from the platform is returned as is. Otherwise the
    /// prompt is triggered and the stream released straight away. Denial is
    /// reported through the error callback, never returned as an error.
    pub fn request_permission(&mut self) -> PermissionStatus {
        match self.backend.query_permission() {
            Some(PermissionStatus::Granted) => PermissionStatus::Granted,
            Some(PermissionStatus::Denied) => {
                self.report(&TrainerError::Permission("denied by the platform".into()));
                PermissionStatus::Denied
            }
            Some(PermissionStatus::Prompt) | None => match self.backend.prompt_permission() {
                Ok(()) => PermissionStatus::Granted,
                Err(err) => {
                    self.report(&err);
                    PermissionStatus::Denied
                }
            },
        }
    }

    /// Acquire a fresh stream and start analysis and recording.
    ///
    /// `now` is read once the device stream is running; that reading is
    /// returned as the start timestamp later used for the recording offset.
    /// On failure nothing is left running and `now` is never called.
    pub fn start(&mut self, now: impl FnOnce() -> Duration) -> Result<Duration> {
        if let Some(active) = &self.active {
            log::warn!("capture already running");
            return Ok(active.started_at);
        }
        match self.open(now) {
            Ok(active) => {
                let started_at = active.started_at;
                self.active = Some(active);
                log::info!("capture started at {:.1} ms", started_at.as_secs_f64() * 1000.0);
                Ok(started_at)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    fn open(&mut self, now: impl FnOnce() -> Duration) -> Result<ActiveCapture> {
        if self.backend.query_permission() == Some(PermissionStatus::Denied) {
            return Err(TrainerError::Permission("denied by the platform".into()));
        }

        let format = self.backend.input_format()?;
        let sample_rate = format.sample_rate as usize;
        let recording_format = RecordingFormat::negotiate(
            &self.config.recording_formats,
            &self.backend.supported_recording_formats(),
        )
        .unwrap_or_else(|| {
            log::warn!("no preferred recording format supported, storing raw samples");
            RecordingFormat::RawF32Le
        });
        log::debug!("input {format:?}, recording as {recording_format:?}");

        let conditioner = SignalConditioner::new(
            &self.profile,
            format.sample_rate as f32,
            self.config.record_ramp_ms,
        );
        let constraints = conditioner.constraints();

        let analysis_len = (sample_rate * ANALYSIS_RING_SECS / BLOCK_LEN).max(16);
        let (analysis_tx, analysis_rx) = RingBuffer::<SampleBlock>::new(analysis_len);
        let (record_tx, record_rx) = RingBuffer::<f32>::new(sample_rate * RECORD_RING_SECS);
        let (result_tx, result_rx) = RingBuffer::<FrameEstimate>::new(RESULT_RING_LEN);

        let stats = Arc::new(RouterStats::default());
        let mut router = InputRouter::new(
            usize::from(format.channels),
            conditioner,
            analysis_tx,
            record_tx,
            stats.clone(),
        );

        let estimator = PitchEstimator::new(
            &self.config.estimator,
            &self.profile,
            format.sample_rate as f32,
        );
        let mut worker = AnalysisWorker::spawn(
            estimator,
            analysis_rx,
            result_tx,
            self.config.estimator.hop_len,
        )
        .map_err(|e| TrainerError::Stream(format!("spawning analysis worker: {e}")))?;

        let stream = match self
            .backend
            .open(&constraints, Box::new(move |data: &[f32]| router.process(data)))
        {
            Ok(stream) => stream,
            Err(err) => {
                worker.stop();
                return Err(err);
            }
        };

        // Device open time is not part of the recording
        let started_at = now();
        let mut emitter =
            PitchEmitter::new(result_rx, self.config.emit_interval(), self.delay.clone());
        emitter.start(started_at);

        Ok(ActiveCapture {
            stream,
            worker,
            emitter,
            recorder: Recorder::new(record_rx, recording_format, format.sample_rate),
            stats,
            started_at,
        })
    }

    /// Drain the rings and emit a pitch event if one is due.
    ///
    /// `position_ms` is the playback position at `now`.
    pub fn poll(&mut self, now: Duration, position_ms: f64) -> Option<PitchSample> {
        let active = self.active.as_mut()?;
        active.recorder.drain();
        active.emitter.poll(now, position_ms)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn started_at(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.started_at)
    }

    pub fn stats(&self) -> Option<&RouterStats> {
        self.active.as_ref().map(|a| a.stats.as_ref())
    }

    /// Raw input RMS of the latest callback, 0 when not capturing.
    pub fn input_level(&self) -> f32 {
        self.active.as_ref().map_or(0.0, |a| a.stats.level())
    }

    /// Halt the cadence, release the stream and resolve the recording.
    ///
    /// Calling it again, or before `start`, does nothing and returns `None`.
    pub fn stop(&mut self) -> Option<AudioBlob> {
        let ActiveCapture {
            stream,
            mut worker,
            mut emitter,
            recorder,
            stats,
            ..
        } = self.active.take()?;

        emitter.stop();
        stream.close();
        worker.stop();
        log::info!(
            "capture stopped: {} frames in, {} blocks dropped, {} recording samples dropped, {} events",
            stats.frames_in.load(std::sync::atomic::Ordering::Relaxed),
            stats.blocks_dropped.load(std::sync::atomic::Ordering::Relaxed),
            stats.recording_dropped.load(std::sync::atomic::Ordering::Relaxed),
            emitter.emitted()
        );

        match recorder.finish() {
            Ok(blob) => Some(blob),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }
}

impl<B: InputBackend> Drop for CapturePipeline<B> {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}
