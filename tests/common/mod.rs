#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use pitch_trainer::{
    capture::{InputBackend, InputCallback, InputFormat, InputStream, PermissionStatus, RecordingFormat},
    conditioner::CaptureConstraints,
    transport::{AudioBuffer, ManualClock, PlaybackSink, SourceId, StopOutcome},
    Result, TrainerError,
};

pub const INPUT_RATE: u32 = 48_000;

/// What the transport asked the sink to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SinkEvent {
    Load(SourceId),
    Start {
        id: SourceId,
        offset_secs: f64,
        delay_secs: f64,
    },
    Stop(SourceId),
}

#[derive(Debug, Default)]
struct SinkLog {
    events: Vec<SinkEvent>,
    sounding: [bool; 4],
}

/// Sink that only records calls. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.log.lock().unwrap().events.clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().events.clear();
    }

    pub fn starts(&self) -> Vec<SinkEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, SinkEvent::Start { .. }))
            .collect()
    }

    pub fn is_sounding(&self, id: SourceId) -> bool {
        self.log.lock().unwrap().sounding[id.index()]
    }
}

impl PlaybackSink for RecordingSink {
    fn load(&mut self, id: SourceId, _buffer: AudioBuffer) -> Result<()> {
        self.log.lock().unwrap().events.push(SinkEvent::Load(id));
        Ok(())
    }

    fn start(&mut self, id: SourceId, offset_secs: f64, delay_secs: f64) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.sounding[id.index()] = true;
        log.events.push(SinkEvent::Start {
            id,
            offset_secs,
            delay_secs,
        });
        Ok(())
    }

    fn stop(&mut self, id: SourceId) -> StopOutcome {
        let mut log = self.log.lock().unwrap();
        if !std::mem::replace(&mut log.sounding[id.index()], false) {
            return StopOutcome::AlreadyStopped;
        }
        log.events.push(SinkEvent::Stop(id));
        StopOutcome::Stopped
    }
}

type SharedCallback = Arc<Mutex<Option<InputCallback>>>;

/// Mono input whose samples are pushed by the test.
pub struct ScriptedBackend {
    pub permission: Option<PermissionStatus>,
    pub refuse_open: bool,
    /// Time the device takes to open, spent on the given clock
    pub open_lag: Option<(ManualClock, Duration)>,
    callback: SharedCallback,
}

#[derive(Clone)]
pub struct Microphone(SharedCallback);

impl Microphone {
    /// Deliver one device callback; returns false when no stream is open.
    pub fn feed(&self, samples: &[f32]) -> bool {
        match self.0.lock().unwrap().as_mut() {
            Some(callback) => {
                callback(samples);
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }
}

impl ScriptedBackend {
    pub fn granted() -> (Self, Microphone) {
        let callback = SharedCallback::default();
        let backend = Self {
            permission: Some(PermissionStatus::Granted),
            refuse_open: false,
            open_lag: None,
            callback: callback.clone(),
        };
        (backend, Microphone(callback))
    }
}

struct ScriptedStream(SharedCallback);

impl InputStream for ScriptedStream {
    fn close(self: Box<Self>) {
        self.0.lock().unwrap().take();
    }
}

impl InputBackend for ScriptedBackend {
    fn query_permission(&self) -> Option<PermissionStatus> {
        self.permission
    }

    fn prompt_permission(&mut self) -> Result<()> {
        Ok(())
    }

    fn input_format(&self) -> Result<InputFormat> {
        Ok(InputFormat {
            sample_rate: INPUT_RATE,
            channels: 1,
        })
    }

    fn supported_recording_formats(&self) -> Vec<RecordingFormat> {
        vec![RecordingFormat::WavF32, RecordingFormat::WavPcm16]
    }

    fn open(
        &mut self,
        _constraints: &CaptureConstraints,
        callback: InputCallback,
    ) -> Result<Box<dyn InputStream>> {
        if self.refuse_open {
            return Err(TrainerError::DeviceUnavailable("no microphone".into()));
        }
        if let Some((clock, lag)) = &self.open_lag {
            clock.advance(*lag);
        }
        *self.callback.lock().unwrap() = Some(callback);
        Ok(Box::new(ScriptedStream(self.callback.clone())))
    }
}

/// Silent mono buffer of `ms` milliseconds at 1 kHz.
pub fn silent_buffer(ms: usize) -> AudioBuffer {
    AudioBuffer::new(vec![0.0; ms], 1, 1000)
}
