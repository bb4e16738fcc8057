//! Realtime stage of the capture path.
//!
//! Runs inside the device input callback. Per callback it only does
//! fixed-cost work: downmix, two gain multiplies and copies into lock-free
//! rings. Pitch estimation happens on the worker thread.

use std::sync::{
    atomic::{AtomicU32, AtomicU64, Ordering},
    Arc,
};

use rtrb::{Producer, PushError};

use crate::{
    conditioner::SignalConditioner,
    dsp::level::{downmix_into, rms},
    MAX_BLOCK_SIZE,
};

/// Samples per block handed to the compute stage.
pub const BLOCK_LEN: usize = 128;

/// Fixed-size block of detection-path samples.
#[derive(Clone, Copy)]
pub struct SampleBlock(pub [f32; BLOCK_LEN]);

impl Default for SampleBlock {
    fn default() -> Self {
        SampleBlock([0.0; BLOCK_LEN])
    }
}

impl SampleBlock {
    pub fn samples(&self) -> &[f32] {
        &self.0
    }
}

/// Counters shared with the control thread for diagnostics.
#[derive(Debug, Default)]
pub struct RouterStats {
    pub frames_in: AtomicU64,
    pub blocks_dropped: AtomicU64,
    pub recording_dropped: AtomicU64,
    /// RMS of the most recent raw input chunk, as f32 bits
    level_bits: AtomicU32,
}

impl RouterStats {
    /// Raw input level of the last callback chunk.
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    fn set_level(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }
}

/// Input callback body: one source fanned out to analysis and recording.
pub struct InputRouter {
    channels: usize,
    conditioner: SignalConditioner,
    mono: Vec<f32>,
    detection: Vec<f32>,
    recording: Vec<f32>,
    block: SampleBlock,
    filled: usize,
    analysis_tx: Producer<SampleBlock>,
    record_tx: Producer<f32>,
    stats: Arc<RouterStats>,
}

impl InputRouter {
    pub fn new(
        channels: usize,
        conditioner: SignalConditioner,
        analysis_tx: Producer<SampleBlock>,
        record_tx: Producer<f32>,
        stats: Arc<RouterStats>,
    ) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            conditioner,
            mono: Vec::with_capacity(MAX_BLOCK_SIZE),
            detection: vec![0.0; MAX_BLOCK_SIZE],
            recording: vec![0.0; MAX_BLOCK_SIZE],
            block: SampleBlock::default(),
            filled: 0,
            analysis_tx,
            record_tx,
            stats,
        }
    }

    /// Handle one interleaved input buffer.
    pub fn process(&mut self, interleaved: &[f32]) {
        // Chunk so the scratch buffers never grow inside the callback
        for chunk in interleaved.chunks(MAX_BLOCK_SIZE * self.channels) {
            downmix_into(chunk, self.channels, &mut self.mono);
            let frames = self.mono.len();
            self.stats
                .frames_in
                .fetch_add(frames as u64, Ordering::Relaxed);
            self.stats.set_level(rms(&self.mono));

            let detection = &mut self.detection[..frames];
            let recording = &mut self.recording[..frames];
            self.conditioner.process(&self.mono, detection, recording);

            self.forward_detection(frames);
            self.forward_recording(frames);
        }
    }

    fn forward_detection(&mut self, frames: usize) {
        let mut offset = 0;
        while offset < frames {
            let take = (BLOCK_LEN - self.filled).min(frames - offset);
            self.block.0[self.filled..self.filled + take]
                .copy_from_slice(&self.detection[offset..offset + take]);
            self.filled += take;
            offset += take;

            if self.filled == BLOCK_LEN {
                if let Err(PushError::Full(_)) = self.analysis_tx.push(self.block) {
                    self.stats.blocks_dropped.fetch_add(1, Ordering::Relaxed);
                }
                self.filled = 0;
            }
        }
    }

    fn forward_recording(&mut self, frames: usize) {
        for (i, &s) in self.recording[..frames].iter().enumerate() {
            if let Err(PushError::Full(_)) = self.record_tx.push(s) {
                // drop remainder if full
                let lost = (frames - i) as u64;
                self.stats.recording_dropped.fetch_add(lost, Ordering::Relaxed);
                break;
            }
        }
    }
}
