//! `cpal` output stream running a [`PlaybackMixer`].

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream,
};

use super::{
    clock::AudioClock,
    mixer::{MixerHandle, PlaybackMixer},
};
use crate::{
    error::{Result, TrainerError},
    MAX_BLOCK_SIZE,
};

/// Keeps the output stream alive. Dropping it stops playback.
pub struct CpalOutput {
    _stream: Stream,
    sample_rate: u32,
    channels: usize,
}

impl CpalOutput {
    /// Open the default output device and start rendering silence until the
    /// returned handle starts a source.
    pub fn open_default() -> Result<(Self, MixerHandle, AudioClock)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TrainerError::DeviceUnavailable("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| TrainerError::DeviceUnavailable(e.to_string()))?;
        if config.sample_format() != SampleFormat::F32 {
            return Err(TrainerError::Stream(format!(
                "unsupported output sample format {:?}",
                config.sample_format()
            )));
        }

        let sample_rate = config.sample_rate().0;
        let channels = usize::from(config.channels());
        log::info!("output device: {sample_rate} Hz, {channels} channel(s)");

        let clock = AudioClock::new(sample_rate);
        let (mut mixer, handle) = PlaybackMixer::new(sample_rate, channels, clock.clone());

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _| {
                    // Bounded chunks keep per-call work predictable
                    for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
                        mixer.render(chunk);
                    }
                },
                |err| log::error!("output stream error: {err}"),
                None,
            )
            .map_err(|e| TrainerError::Stream(e.to_string()))?;
        stream
            .play()
            .map_err(|e| TrainerError::Stream(e.to_string()))?;

        Ok((
            Self {
                _stream: stream,
                sample_rate,
                channels,
            },
            handle,
            clock,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}
