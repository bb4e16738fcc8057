//! Recording path: buffer the recording branch and resolve it into a blob.
//!
//! The container is negotiated once per take from what the platform can
//! play back. The chosen format travels with the bytes in [`AudioBlob`], and
//! decoding always uses that stored format, never a guess.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rtrb::Consumer;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};

/// Containers a take can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RecordingFormat {
    /// 32-bit float WAV
    WavF32,
    /// 16-bit PCM WAV, the most widely playable
    WavPcm16,
    /// Headerless little-endian f32 mono
    RawF32Le,
}

impl RecordingFormat {
    /// Default preference order.
    pub const PREFERENCE: [RecordingFormat; 3] = [
        RecordingFormat::WavF32,
        RecordingFormat::WavPcm16,
        RecordingFormat::RawF32Le,
    ];

    /// First preferred format the platform supports.
    pub fn negotiate(
        preferred: &[RecordingFormat],
        supported: &[RecordingFormat],
    ) -> Option<RecordingFormat> {
        preferred.iter().copied().find(|f| supported.contains(f))
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            RecordingFormat::WavF32 | RecordingFormat::WavPcm16 => "audio/wav",
            RecordingFormat::RawF32Le => "application/octet-stream",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RecordingFormat::WavF32 | RecordingFormat::WavPcm16 => "wav",
            RecordingFormat::RawF32Le => "f32",
        }
    }

    fn wav_spec(self, sample_rate: u32) -> Option<WavSpec> {
        let (bits_per_sample, sample_format) = match self {
            RecordingFormat::WavF32 => (32, SampleFormat::Float),
            RecordingFormat::WavPcm16 => (16, SampleFormat::Int),
            RecordingFormat::RawF32Le => return None,
        };
        Some(WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
            sample_format,
        })
    }
}

fn wav_error(err: hound::Error) -> TrainerError {
    TrainerError::Decode {
        source_name: "recording".to_string(),
        reason: err.to_string(),
    }
}

/// Encoded mono recording plus the format it was encoded with.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub format: RecordingFormat,
    pub sample_rate: u32,
    pub frames: usize,
    pub bytes: Vec<u8>,
}

impl AudioBlob {
    pub fn encode(format: RecordingFormat, sample_rate: u32, samples: &[f32]) -> Result<Self> {
        let bytes = match format.wav_spec(sample_rate) {
            Some(spec) => {
                let mut cursor = Cursor::new(Vec::new());
                {
                    let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
                    for &s in samples {
                        match spec.sample_format {
                            SampleFormat::Float => writer.write_sample(s),
                            SampleFormat::Int => {
                                let s = s.clamp(-1.0, 1.0);
                                writer.write_sample((s * i16::MAX as f32) as i16)
                            }
                        }
                        .map_err(wav_error)?;
                    }
                    writer.finalize().map_err(wav_error)?;
                }
                cursor.into_inner()
            }
            None => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        };

        Ok(Self {
            format,
            sample_rate,
            frames: samples.len(),
            bytes,
        })
    }

    /// Decode with the stored format.
    pub fn decode(&self) -> Result<Vec<f32>> {
        match self.format {
            RecordingFormat::WavF32 | RecordingFormat::WavPcm16 => {
                let reader = WavReader::new(Cursor::new(&self.bytes)).map_err(wav_error)?;
                let spec = reader.spec();
                match spec.sample_format {
                    SampleFormat::Float => reader
                        .into_samples::<f32>()
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(wav_error),
                    SampleFormat::Int => reader
                        .into_samples::<i16>()
                        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(wav_error),
                }
            }
            RecordingFormat::RawF32Le => {
                if self.bytes.len() % 4 != 0 {
                    return Err(TrainerError::Decode {
                        source_name: "recording".to_string(),
                        reason: format!("{} bytes is not a whole number of f32 samples", self.bytes.len()),
                    });
                }
                Ok(self
                    .bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect())
            }
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Collects the recording branch during a take.
pub struct Recorder {
    rx: Consumer<f32>,
    samples: Vec<f32>,
    format: RecordingFormat,
    sample_rate: u32,
}

impl Recorder {
    pub fn new(rx: Consumer<f32>, format: RecordingFormat, sample_rate: u32) -> Self {
        Self {
            rx,
            samples: Vec::new(),
            format,
            sample_rate,
        }
    }

    pub fn format(&self) -> RecordingFormat {
        self.format
    }

    /// Pull whatever the input callback has produced. Returns samples moved.
    pub fn drain(&mut self) -> usize {
        let before = self.samples.len();
        while let Ok(s) = self.rx.pop() {
            self.samples.push(s);
        }
        self.samples.len() - before
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drain the remainder and encode everything into one blob.
    pub fn finish(mut self) -> Result<AudioBlob> {
        self.drain();
        log::debug!(
            "encoding {} recorded samples as {:?}",
            self.samples.len(),
            self.format
        );
        AudioBlob::encode(self.format, self.sample_rate, &self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrb::RingBuffer;

    #[test]
    fn test_negotiate_picks_first_supported() {
        let supported = [RecordingFormat::RawF32Le, RecordingFormat::WavPcm16];
        assert_eq!(
            RecordingFormat::negotiate(&RecordingFormat::PREFERENCE, &supported),
            Some(RecordingFormat::WavPcm16)
        );
        assert_eq!(RecordingFormat::negotiate(&RecordingFormat::PREFERENCE, &[]), None);
    }

    #[test]
    fn test_blob_decodes_with_its_own_format() {
        let samples = vec![0.0, 0.25, -0.5, 1.0];
        for format in RecordingFormat::PREFERENCE {
            let blob = AudioBlob::encode(format, 48_000, &samples).unwrap();
            assert_eq!(blob.format, format);
            let decoded = blob.decode().unwrap();
            assert_eq!(decoded.len(), samples.len());
            for (a, b) in decoded.iter().zip(&samples) {
                assert!((a - b).abs() < 1e-3, "{format:?}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_wrong_format_does_not_decode() {
        let blob = AudioBlob::encode(RecordingFormat::RawF32Le, 48_000, &[0.1; 16]).unwrap();
        let relabelled = AudioBlob {
            format: RecordingFormat::WavF32,
            ..blob
        };
        assert!(relabelled.decode().is_err());
    }

    #[test]
    fn test_recorder_drains_ring() {
        let (mut tx, rx) = RingBuffer::<f32>::new(64);
        let mut recorder = Recorder::new(rx, RecordingFormat::WavF32, 1000);
        for i in 0..10 {
            tx.push(i as f32 / 10.0).unwrap();
        }
        assert_eq!(recorder.drain(), 10);
        tx.push(0.5).unwrap();
        let blob = recorder.finish().unwrap();
        assert_eq!(blob.frames, 11);
        assert!((blob.duration_ms() - 11.0).abs() < 1e-9);
    }
}
