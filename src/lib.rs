//! Canvas Capture - record a live canvas into a video file.
//!
//! A `CaptureController` binds a frame source (such as a `Canvas`) to a
//! recorder, buffers the fragments the recorder emits and saves them as one
//! file on demand.

pub mod capture;
pub mod commands;
pub mod export;
pub mod recorder;
pub mod utils;

pub use capture::{Canvas, FrameSource, MediaStream};
pub use export::{Artifact, FfmpegRecorder, SavedArtifact};
pub use recorder::{CaptureController, RecorderOptions, RecorderState, RecordingEvent};
pub use utils::error::{CaptureError, CaptureResult};
