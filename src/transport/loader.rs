//! Concurrent, cancellable buffer loading.
//!
//! Every source decodes on its own thread. A coordinator thread collects
//! them with a shared deadline and hands one outcome back. Each load carries
//! a generation number; cancelling bumps it, so an outcome that arrives
//! after a teardown is discarded instead of applied.

use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};

use super::buffer::AudioBuffer;
use crate::{
    capture::AudioBlob,
    error::{Result, TrainerError},
};

/// Where one buffer comes from.
#[derive(Debug, Clone)]
pub enum BufferSource {
    File(PathBuf),
    Encoded {
        name: String,
        bytes: Arc<[u8]>,
        extension: Option<String>,
    },
    Recording(AudioBlob),
    /// Already decoded
    Pcm(AudioBuffer),
}

impl BufferSource {
    pub fn name(&self) -> String {
        match self {
            BufferSource::File(path) => path.display().to_string(),
            BufferSource::Encoded { name, .. } => name.clone(),
            BufferSource::Recording(_) => "take recording".to_string(),
            BufferSource::Pcm(_) => "pcm".to_string(),
        }
    }

    fn decode(self) -> Result<AudioBuffer> {
        match self {
            BufferSource::File(path) => AudioBuffer::decode_file(path),
            BufferSource::Encoded {
                name,
                bytes,
                extension,
            } => AudioBuffer::decode_bytes(&name, bytes.to_vec(), extension.as_deref()),
            BufferSource::Recording(blob) => AudioBuffer::from_blob(&blob),
            BufferSource::Pcm(buffer) => Ok(buffer),
        }
    }
}

/// Everything one transport plays.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub instrumental: BufferSource,
    pub guide: Option<BufferSource>,
    /// Only in playback-only review mode
    pub take: Option<BufferSource>,
}

#[derive(Debug, Clone)]
pub struct LoadedBuffers {
    pub instrumental: AudioBuffer,
    pub guide: Option<AudioBuffer>,
    pub take: Option<AudioBuffer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Idle,
    Loading,
    Loaded,
    Error,
}

type Outcome = (u64, Result<LoadedBuffers>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Instrumental,
    Guide,
    Take,
}

pub struct BufferLoader {
    timeout: Duration,
    state: BufferState,
    generation: u64,
    rx: Option<Receiver<Outcome>>,
    error: Option<TrainerError>,
}

impl BufferLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            state: BufferState::Idle,
            generation: 0,
            rx: None,
            error: None,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Error of the last failed load, kept for the retry prompt.
    pub fn error(&self) -> Option<&TrainerError> {
        self.error.as_ref()
    }

    /// Start decoding. A call while a load is in flight is ignored and
    /// returns `false`.
    pub fn start_loading(&mut self, request: LoadRequest) -> bool {
        if self.state == BufferState::Loading {
            log::debug!("load already in flight, ignoring");
            return false;
        }
        self.generation += 1;
        self.state = BufferState::Loading;
        self.error = None;

        let (tx, rx) = bounded::<Outcome>(1);
        self.rx = Some(rx);
        let generation = self.generation;
        let timeout = self.timeout;

        let spawned = thread::Builder::new()
            .name("buffer-loader".into())
            .spawn(move || {
                let outcome = load_all(request, timeout);
                // Receiver gone means the load was cancelled
                let _ = tx.send((generation, outcome));
            });
        if let Err(err) = spawned {
            self.fail(TrainerError::Io(err));
        }
        true
    }

    fn fail(&mut self, err: TrainerError) {
        log::warn!("buffer load failed: {err}");
        self.state = BufferState::Error;
        self.error = Some(err);
        self.rx = None;
    }

    /// Non-blocking check for a finished load. Returns the buffers exactly
    /// once, when the state turns `Loaded`.
    pub fn poll(&mut self) -> Option<LoadedBuffers> {
        let received = match self.rx.as_ref()?.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.fail(TrainerError::Stream("loader thread exited".into()));
                return None;
            }
        };
        self.accept(received)
    }

    /// Block until the in-flight load resolves.
    pub fn wait(&mut self) -> Option<LoadedBuffers> {
        let received = self.rx.as_ref()?.recv().ok();
        match received {
            Some(outcome) => self.accept(outcome),
            None => {
                self.fail(TrainerError::Stream("loader thread exited".into()));
                None
            }
        }
    }

    fn accept(&mut self, (generation, outcome): Outcome) -> Option<LoadedBuffers> {
        if generation != self.generation {
            log::debug!("discarding stale load #{generation}");
            return None;
        }
        self.rx = None;
        match outcome {
            Ok(buffers) => {
                self.state = BufferState::Loaded;
                Some(buffers)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Drop any in-flight load. Its result will never be applied.
    pub fn cancel(&mut self) {
        if self.state == BufferState::Loading {
            log::debug!("cancelling load #{}", self.generation);
            self.generation += 1;
            self.rx = None;
            self.state = BufferState::Idle;
        }
    }
}

impl Drop for BufferLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn load_all(request: LoadRequest, timeout: Duration) -> Result<LoadedBuffers> {
    let deadline = Instant::now() + timeout;
    let (tx, rx) = crossbeam_channel::unbounded::<(Slot, Result<AudioBuffer>)>();

    let mut pending = Vec::new();
    let jobs = [
        (Slot::Instrumental, Some(request.instrumental)),
        (Slot::Guide, request.guide),
        (Slot::Take, request.take),
    ];
    for (slot, source) in jobs {
        let Some(source) = source else { continue };
        let name = source.name();
        let tx = tx.clone();
        thread::Builder::new()
            .name(format!("decode-{slot:?}").to_lowercase())
            .spawn(move || {
                let _ = tx.send((slot, source.decode()));
            })?;
        pending.push((slot, name));
    }
    drop(tx);

    let mut instrumental = None;
    let mut guide = None;
    let mut take = None;
    while !pending.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (slot, result) = match rx.recv_timeout(remaining) {
            Ok(done) => done,
            Err(RecvTimeoutError::Timeout) => {
                return Err(TrainerError::DecodeTimeout {
                    source_name: pending
                        .iter()
                        .map(|(_, name)| name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TrainerError::Stream("decoder thread exited".into()))
            }
        };
        pending.retain(|(pending_slot, _)| *pending_slot != slot);
        let buffer = result?;
        match slot {
            Slot::Instrumental => instrumental = Some(buffer),
            Slot::Guide => guide = Some(buffer),
            Slot::Take => take = Some(buffer),
        }
    }

    let instrumental = instrumental.ok_or_else(|| TrainerError::Decode {
        source_name: "instrumental".into(),
        reason: "no buffer produced".into(),
    })?;
    Ok(LoadedBuffers {
        instrumental,
        guide,
        take,
    })
}
