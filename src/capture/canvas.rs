//! In-memory RGBA canvas
//!
//! A minimal drawable surface. Drawing bumps the generation counter so that
//! change-driven streams know when a new frame exists.

use super::traits::{CapturedFrame, FrameSource, Resolution, BYTES_PER_PIXEL};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// RGBA color
pub type Rgba = [u8; 4];

/// Drawable RGBA surface
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: RwLock<Vec<u8>>,
    generation: AtomicU64,
    /// Set once foreign content has been drawn; never cleared
    tainted: AtomicBool,
}

impl Canvas {
    /// Create a transparent black canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: RwLock::new(vec![0; CapturedFrame::byte_len(width, height)]),
            generation: AtomicU64::new(0),
            tainted: AtomicBool::new(false),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the whole canvas with one color
    pub fn fill(&self, color: Rgba) {
        self.draw(|pixels, _, _| {
            for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&color);
            }
        });
    }

    /// Fill a rectangle, clipped to the canvas bounds
    pub fn fill_rect(&self, x: i64, y: i64, w: u32, h: u32, color: Rgba) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let x1 = (x + w as i64).clamp(0, self.width as i64) as usize;
        let y1 = (y + h as i64).clamp(0, self.height as i64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        self.draw(|pixels, width, _| {
            let stride = width as usize * BYTES_PER_PIXEL;
            for row in y0..y1 {
                let start = row * stride + x0 * BYTES_PER_PIXEL;
                let end = row * stride + x1 * BYTES_PER_PIXEL;
                for px in pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                    px.copy_from_slice(&color);
                }
            }
        });
    }

    /// Draw directly on the pixel buffer.
    ///
    /// The closure receives the RGBA buffer, width and height.
    pub fn draw<F>(&self, f: F)
    where
        F: FnOnce(&mut [u8], u32, u32),
    {
        let mut pixels = self.pixels.write();
        f(&mut pixels, self.width, self.height);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark the canvas as holding cross-origin content.
    ///
    /// A tainted canvas refuses to be captured.
    pub fn mark_tainted(&self) {
        self.tainted.store(true, Ordering::SeqCst);
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted.load(Ordering::SeqCst)
    }
}

impl FrameSource for Canvas {
    fn dimensions(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> CapturedFrame {
        let pixels = self.pixels.read();
        CapturedFrame {
            width: self.width,
            height: self.height,
            data: pixels.clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    fn check_capturable(&self) -> CaptureResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::CaptureUnsupported(format!(
                "canvas has no area ({}x{})",
                self.width, self.height
            )));
        }
        if self.is_tainted() {
            return Err(CaptureError::CaptureUnsupported(
                "canvas is tainted by cross-origin content".to_string(),
            ));
        }
        Ok(())
    }
}
