//! `cpal` input backend.

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BuildStreamError, Device, SampleFormat, Stream, SupportedStreamConfig,
};

use super::{
    backend::{InputBackend, InputCallback, InputFormat, InputStream, PermissionStatus},
    recorder::RecordingFormat,
};
use crate::{
    conditioner::CaptureConstraints,
    error::{Result, TrainerError},
    MAX_BLOCK_SIZE,
};

/// Default input device of the default host.
pub struct CpalInput {
    device: Device,
    config: SupportedStreamConfig,
}

impl CpalInput {
    pub fn default_device() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| TrainerError::DeviceUnavailable("no default input device".into()))?;
        let config = device
            .default_input_config()
            .map_err(|e| TrainerError::DeviceUnavailable(e.to_string()))?;
        log::info!(
            "input device {:?}: {} Hz, {} channel(s), {:?}",
            device.name().unwrap_or_default(),
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );
        Ok(Self { device, config })
    }

    fn build(&self, mut callback: InputCallback) -> Result<Stream> {
        let err_fn = |err: cpal::StreamError| log::error!("input stream error: {err}");
        let stream_config = self.config.config();

        let stream = match self.config.sample_format() {
            SampleFormat::F32 => self.device.build_input_stream(
                &stream_config,
                move |data: &[f32], _| callback(data),
                err_fn,
                None,
            ),
            SampleFormat::I16 => {
                let mut converter = I16Converter::new(usize::from(stream_config.channels));
                self.device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| converter.feed(data, &mut callback),
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(TrainerError::Stream(format!(
                    "unsupported input sample format {other:?}"
                )))
            }
        };

        stream.map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => {
                TrainerError::DeviceUnavailable("input device disappeared".into())
            }
            // Platforms report a refused capture session as a backend error
            BuildStreamError::BackendSpecific { err } => TrainerError::Permission(err.to_string()),
            other => TrainerError::Stream(other.to_string()),
        })
    }
}

/// Converts i16 callbacks to f32 in a scratch buffer sized once.
struct I16Converter {
    scratch: Vec<f32>,
}

impl I16Converter {
    fn new(channels: usize) -> Self {
        Self {
            scratch: vec![0.0; MAX_BLOCK_SIZE * channels.max(1)],
        }
    }

    /// Whole frames per chunk, never past the scratch capacity.
    fn feed(&mut self, data: &[i16], callback: &mut impl FnMut(&[f32])) {
        for chunk in data.chunks(self.scratch.len()) {
            let out = &mut self.scratch[..chunk.len()];
            for (o, &s) in out.iter_mut().zip(chunk) {
                *o = f32::from(s) / f32::from(i16::MAX);
            }
            callback(out);
        }
    }
}

struct CpalStream(Stream);

impl InputStream for CpalStream {
    fn close(self: Box<Self>) {
        if let Err(err) = self.0.pause() {
            log::debug!("pausing input stream on close: {err}");
        }
    }
}

impl InputBackend for CpalInput {
    fn query_permission(&self) -> Option<PermissionStatus> {
        // No status API on desktop hosts
        None
    }

    fn prompt_permission(&mut self) -> Result<()> {
        let stream = self.build(Box::new(|_: &[f32]| {}))?;
        drop(stream);
        Ok(())
    }

    fn input_format(&self) -> Result<InputFormat> {
        Ok(InputFormat {
            sample_rate: self.config.sample_rate().0,
            channels: self.config.channels(),
        })
    }

    fn supported_recording_formats(&self) -> Vec<RecordingFormat> {
        RecordingFormat::PREFERENCE.to_vec()
    }

    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        callback: InputCallback,
    ) -> Result<Box<dyn InputStream>> {
        if constraints.echo_cancellation {
            log::debug!("echo cancellation requested; host stream has no such control");
        }
        let stream = self.build(callback)?;
        stream
            .play()
            .map_err(|e| TrainerError::Stream(e.to_string()))?;
        Ok(Box::new(CpalStream(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_conversion_chunks_large_callbacks() {
        let mut converter = I16Converter::new(2);
        let capacity = converter.scratch.capacity();
        let data = vec![i16::MAX; MAX_BLOCK_SIZE * 2 * 2 + 6];

        let mut chunks = Vec::new();
        converter.feed(&data, &mut |out: &[f32]| {
            assert!(out.iter().all(|&s| s == 1.0));
            chunks.push(out.len());
        });
        assert_eq!(chunks, vec![MAX_BLOCK_SIZE * 2, MAX_BLOCK_SIZE * 2, 6]);
        assert_eq!(converter.scratch.capacity(), capacity);

        let mut seen = Vec::new();
        converter.feed(&[0, -i16::MAX], &mut |out: &[f32]| seen.extend_from_slice(out));
        assert_eq!(seen, vec![0.0, -1.0]);
    }
}
