//! Frame sources and the live streams captured from them
//!
//! A `FrameSource` is anything that can be drawn on and sampled. A
//! `MediaStream` is the live capture of one source that recorders consume.

pub mod canvas;
pub mod stream;
pub mod traits;

pub use canvas::{Canvas, Rgba};
pub use stream::{FrameReceiver, MediaStream, MAX_FRAME_RATE};
pub use traits::{CapturedFrame, FrameSource, Resolution};
