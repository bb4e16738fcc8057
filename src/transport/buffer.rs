//! Decoded playback buffers.

use std::{io::Cursor, path::Path, sync::Arc};

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

use crate::{
    capture::AudioBlob,
    error::{Result, TrainerError},
};

/// Interleaved PCM shared between the loader, the transport and the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.max(1),
            sample_rate,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / f64::from(self.sample_rate)
    }

    /// Sample at `frame` for output channel `channel`; mono buffers feed
    /// every output channel.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let ch = channel % usize::from(self.channels);
        self.samples
            .get(frame * usize::from(self.channels) + ch)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Handles sharing these samples, this one included.
    #[cfg(test)]
    pub(crate) fn share_count(&self) -> usize {
        Arc::strong_count(&self.samples)
    }

    /// Rebuild a take recording with its stored format.
    pub fn from_blob(blob: &AudioBlob) -> Result<Self> {
        Ok(Self::new(blob.decode()?, 1, blob.sample_rate))
    }

    pub fn decode_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| decode_error(&name, e))?;
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        decode_stream(&name, MediaSourceStream::new(Box::new(file), Default::default()), hint)
    }

    /// Decode an in-memory encoded file. `extension` helps the prober.
    pub fn decode_bytes(name: &str, bytes: Vec<u8>, extension: Option<&str>) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        let source = Box::new(Cursor::new(bytes));
        decode_stream(name, MediaSourceStream::new(source, Default::default()), hint)
    }
}

fn decode_error(name: &str, err: impl std::fmt::Display) -> TrainerError {
    TrainerError::Decode {
        source_name: name.to_string(),
        reason: err.to_string(),
    }
}

fn decode_stream(name: &str, mss: MediaSourceStream, hint: Hint) -> Result<AudioBuffer> {
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(name, e))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| decode_error(name, "no audio track"))?
        .clone();

    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(name, e))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(decode_error(name, e)),
        };
        if packet.track_id() != track.id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(audio) => audio,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::DecodeError(reason)) => {
                log::debug!("{name}: skipping bad packet: {reason}");
                continue;
            }
            Err(e) => return Err(decode_error(name, e)),
        };

        if channels == 0 {
            channels = decoded.spec().channels.count() as u16;
        }
        let mut sb = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sb.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sb.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(decode_error(name, "missing channel layout or sample rate"));
    }
    let buffer = AudioBuffer::new(samples, channels, sample_rate);
    log::debug!(
        "decoded {name}: {:.1} s, {} ch, {} Hz",
        buffer.duration_ms() / 1000.0,
        channels,
        sample_rate
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RecordingFormat;

    #[test]
    fn test_decode_wav_bytes() {
        let blob = AudioBlob::encode(RecordingFormat::WavF32, 8_000, &vec![0.25; 8_000]).unwrap();
        let buffer = AudioBuffer::decode_bytes("take.wav", blob.bytes, Some("wav")).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.sample_rate(), 8_000);
        assert_eq!(buffer.frames(), 8_000);
        assert!((buffer.duration_ms() - 1000.0).abs() < 1e-9);
        assert!((buffer.sample(100, 1) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = AudioBuffer::decode_bytes("noise", vec![7; 512], None).unwrap_err();
        assert!(matches!(err, TrainerError::Decode { .. }));
    }

    #[test]
    fn test_raw_blob_uses_its_format() {
        let blob = AudioBlob::encode(RecordingFormat::RawF32Le, 16_000, &[0.5; 160]).unwrap();
        let buffer = AudioBuffer::from_blob(&blob).unwrap();
        assert_eq!(buffer.frames(), 160);
        assert!((buffer.duration_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_stereo_indexing() {
        let buffer = AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 2, 10);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.sample(1, 0), 0.3);
        assert_eq!(buffer.sample(1, 1), 0.4);
        assert_eq!(buffer.sample(5, 0), 0.0);
    }
}
