pub mod calibration; // Microphone latency measurement
pub mod capture; // Realtime input, estimation worker, pitch cadence, recording
pub mod conditioner;
pub mod config;
pub mod dsp;
pub mod error;
pub mod lyrics;
pub mod melody;
pub mod pitch; // McLeod estimator and stabilisation
pub mod render; // Pitch-bar scene model
pub mod scoring;
pub mod session;
pub mod store;
pub mod timeline;
pub mod transport; // Backing-track playback and position

pub use error::{Result, TrainerError};

pub const MAX_BLOCK_SIZE: usize = 2048;
