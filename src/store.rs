//! Persistence seams: the single "last take" slot and the calibration value.
//!
//! Both stores are external collaborators. The session talks to them through
//! the traits below and only writes a take on an explicit save.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};
#[cfg(feature = "serde")]
use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    capture::AudioBlob,
    error::{Result, TrainerError},
    scoring::ScoreResult,
    timeline::PitchSample,
};
#[cfg(feature = "serde")]
use crate::capture::RecordingFormat;

/// Upper bound accepted for the microphone delay.
pub const MAX_MIC_DELAY_MS: i32 = 1000;

/// Process-wide microphone round-trip delay in milliseconds.
///
/// Cloning shares the value. Written by calibration and the +/- controls,
/// read by the emitter on every event.
#[derive(Debug, Clone, Default)]
pub struct MicDelay(Arc<AtomicI32>);

impl MicDelay {
    pub fn new(ms: i32) -> Self {
        Self(Arc::new(AtomicI32::new(ms.clamp(0, MAX_MIC_DELAY_MS))))
    }

    pub fn get_ms(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_ms(&self, ms: i32) {
        self.0.store(ms.clamp(0, MAX_MIC_DELAY_MS), Ordering::Relaxed);
    }

    /// Nudge by `delta_ms` and return the new value.
    pub fn adjust(&self, delta_ms: i32) -> i32 {
        let next = (self.get_ms() + delta_ms).clamp(0, MAX_MIC_DELAY_MS);
        self.set_ms(next);
        next
    }
}

/// What the single slot holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTake {
    pub score: u8,
    pub timeline: Vec<PitchSample>,
    pub duration_ms: f64,
    pub recording_offset_ms: f64,
    pub recording: Option<AudioBlob>,
}

impl From<&ScoreResult> for SavedTake {
    fn from(result: &ScoreResult) -> Self {
        Self {
            score: result.percentage,
            timeline: result.timeline.to_vec(),
            duration_ms: result.duration_ms,
            recording_offset_ms: result.recording_offset_ms,
            recording: result.recording.clone(),
        }
    }
}

pub trait TakeStore {
    fn get(&self) -> Result<Option<SavedTake>>;
    /// Replace the slot.
    fn put(&mut self, take: SavedTake) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryTakeStore {
    slot: Option<SavedTake>,
}

impl MemoryTakeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TakeStore for MemoryTakeStore {
    fn get(&self) -> Result<Option<SavedTake>> {
        Ok(self.slot.clone())
    }

    fn put(&mut self, take: SavedTake) -> Result<()> {
        self.slot = Some(take);
        Ok(())
    }
}

#[cfg(feature = "serde")]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobManifest {
    format: RecordingFormat,
    sample_rate: u32,
    frames: usize,
    file: String,
}

#[cfg(feature = "serde")]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeManifest {
    score: u8,
    duration_ms: f64,
    recording_offset_ms: f64,
    timeline: Vec<PitchSample>,
    recording: Option<BlobManifest>,
}

/// Slot kept as `take.json` plus one audio file in a directory.
#[cfg(feature = "serde")]
#[derive(Debug, Clone)]
pub struct JsonTakeStore {
    dir: PathBuf,
}

#[cfg(feature = "serde")]
impl JsonTakeStore {
    const MANIFEST: &'static str = "take.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(feature = "serde")]
impl TakeStore for JsonTakeStore {
    fn get(&self) -> Result<Option<SavedTake>> {
        let path = self.dir.join(Self::MANIFEST);
        if !path.exists() {
            return Ok(None);
        }
        let manifest: TakeManifest = serde_json::from_slice(&fs::read(&path)?)?;

        let recording = match manifest.recording {
            Some(blob) => Some(AudioBlob {
                format: blob.format,
                sample_rate: blob.sample_rate,
                frames: blob.frames,
                bytes: fs::read(self.dir.join(&blob.file))?,
            }),
            None => None,
        };

        Ok(Some(SavedTake {
            score: manifest.score,
            timeline: manifest.timeline,
            duration_ms: manifest.duration_ms,
            recording_offset_ms: manifest.recording_offset_ms,
            recording,
        }))
    }

    fn put(&mut self, take: SavedTake) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let recording = match &take.recording {
            Some(blob) => {
                let file = format!("take.{}", blob.format.extension());
                fs::write(self.dir.join(&file), &blob.bytes)?;
                Some(BlobManifest {
                    format: blob.format,
                    sample_rate: blob.sample_rate,
                    frames: blob.frames,
                    file,
                })
            }
            None => None,
        };

        let manifest = TakeManifest {
            score: take.score,
            duration_ms: take.duration_ms,
            recording_offset_ms: take.recording_offset_ms,
            timeline: take.timeline,
            recording,
        };
        // Write then rename so a crash never leaves half a manifest
        let tmp = self.dir.join("take.json.tmp");
        fs::write(&tmp, serde_json::to_vec(&manifest)?)?;
        fs::rename(&tmp, self.dir.join(Self::MANIFEST))?;
        log::info!("saved take ({}%) to {}", take.score, self.dir.display());
        Ok(())
    }
}

/// Persisted microphone delay.
pub trait CalibrationStore {
    fn load(&self) -> Result<Option<i32>>;
    fn save(&mut self, delay_ms: i32) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCalibrationStore {
    value: Option<i32>,
}

impl MemoryCalibrationStore {
    pub fn new(value: Option<i32>) -> Self {
        Self { value }
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load(&self) -> Result<Option<i32>> {
        Ok(self.value)
    }

    fn save(&mut self, delay_ms: i32) -> Result<()> {
        self.value = Some(delay_ms);
        Ok(())
    }
}

/// Delay stored as a decimal integer in a text file.
#[derive(Debug, Clone)]
pub struct FileCalibrationStore {
    path: std::path::PathBuf,
}

impl FileCalibrationStore {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CalibrationStore for FileCalibrationStore {
    fn load(&self) -> Result<Option<i32>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.trim()
            .parse()
            .map(Some)
            .map_err(|e| TrainerError::Store(format!("{}: {e}", self.path.display())))
    }

    fn save(&mut self, delay_ms: i32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, delay_ms.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RecordingFormat;

    fn take() -> SavedTake {
        SavedTake {
            score: 67,
            timeline: vec![PitchSample::new(0.0, 60), PitchSample::new(20.0, 0)],
            duration_ms: 1000.0,
            recording_offset_ms: -12.5,
            recording: Some(
                AudioBlob::encode(RecordingFormat::WavPcm16, 8_000, &[0.0, 0.5, -0.5]).unwrap(),
            ),
        }
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pitch_trainer_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_mic_delay_is_shared_and_clamped() {
        let a = MicDelay::new(40);
        let b = a.clone();
        b.set_ms(120);
        assert_eq!(a.get_ms(), 120);
        assert_eq!(a.adjust(-500), 0);
        a.set_ms(5000);
        assert_eq!(b.get_ms(), MAX_MIC_DELAY_MS);
    }

    #[test]
    fn test_memory_slot_replaces() {
        let mut store = MemoryTakeStore::new();
        assert!(store.get().unwrap().is_none());
        store.put(take()).unwrap();
        let mut second = take();
        second.score = 90;
        store.put(second).unwrap();
        assert_eq!(store.get().unwrap().unwrap().score, 90);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_store_keeps_blob_format() {
        let dir = temp_dir("take");
        let mut store = JsonTakeStore::new(&dir);
        assert!(store.get().unwrap().is_none());

        store.put(take()).unwrap();
        let loaded = store.get().unwrap().unwrap();
        assert_eq!(loaded, take());
        assert!(dir.join("take.wav").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_calibration_store() {
        let dir = temp_dir("calibration");
        let mut store = FileCalibrationStore::new(dir.join("mic_delay"));
        assert_eq!(store.load().unwrap(), None);
        store.save(85).unwrap();
        assert_eq!(store.load().unwrap(), Some(85));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
