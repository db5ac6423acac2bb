//! Recording system module
//!
//! This module implements the recording side of a capture:
//! - MediaRecorder trait for anything that encodes a stream into fragments
//! - ChunkBuffer holding one session's fragments in emission order
//! - CaptureController to drive a recorder and export what it produced

pub mod buffer;
pub mod channel;
pub mod controller;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::{ChunkBuffer, Fragment};
pub use channel::{FragmentSink, MediaRecorder};
pub use controller::{CaptureController, RecordingEvent};
pub use state::{RecorderOptions, RecorderState, RecordingSession, SessionSummary};
