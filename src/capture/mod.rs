//! Microphone capture: realtime routing, off-thread estimation, fixed-cadence
//! pitch events and the take recording.

pub mod backend;
pub mod device;
pub mod emitter;
pub mod pipeline;
pub mod recorder;
pub mod router;
pub mod worker;

pub use backend::{InputBackend, InputCallback, InputFormat, InputStream, PermissionStatus};
pub use device::CpalInput;
pub use emitter::PitchEmitter;
pub use pipeline::CapturePipeline;
pub use recorder::{AudioBlob, Recorder, RecordingFormat};
pub use router::{InputRouter, RouterStats, SampleBlock, BLOCK_LEN};
pub use worker::{AnalysisWorker, FrameEstimate};
