//! Capture trait definitions
//!
//! Source-agnostic traits and types for things that can be captured.

use crate::utils::error::CaptureResult;
use serde::{Deserialize, Serialize};

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// A captured frame with its dimensions and pixel data.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixel data, row-major, no padding
    pub data: Vec<u8>,
    /// Source generation the frame was taken at
    pub generation: u64,
}

impl CapturedFrame {
    /// Expected byte length of a frame with the given dimensions
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }
}

/// Surface dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A drawable surface producing a continuous sequence of frames.
///
/// Implementations are owned by whoever draws on them; capture only holds a
/// shared handle and samples it.
pub trait FrameSource: Send + Sync {
    /// Current surface size
    fn dimensions(&self) -> Resolution;

    /// Counter bumped on every draw, used to detect changes
    fn generation(&self) -> u64;

    /// Copy of the current contents
    fn snapshot(&self) -> CapturedFrame;

    /// Whether the surface may be captured at all
    fn check_capturable(&self) -> CaptureResult<()> {
        Ok(())
    }
}
