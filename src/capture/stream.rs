//! Live frame streams derived from a frame source

use super::traits::{CapturedFrame, FrameSource, Resolution};
use crate::utils::error::{CaptureError, CaptureResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Receiver for captured frames.
pub type FrameReceiver = mpsc::Receiver<CapturedFrame>;

/// Poll rate used when the stream only emits on change
const CHANGE_POLL_HZ: f64 = 60.0;

/// Frames buffered between the sampler and a slow consumer
const FRAME_QUEUE_DEPTH: usize = 4;

/// Highest fixed frame rate a stream accepts
pub const MAX_FRAME_RATE: f64 = 1000.0;

/// Sampling period for `frame_rate`, or an error if it has none
fn sample_period(frame_rate: f64) -> CaptureResult<Duration> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 || frame_rate > MAX_FRAME_RATE {
        return Err(CaptureError::InvalidConfig(format!(
            "frame rate must be in (0, {}], got {}",
            MAX_FRAME_RATE, frame_rate
        )));
    }
    match Duration::try_from_secs_f64(1.0 / frame_rate) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(CaptureError::InvalidConfig(format!(
            "frame rate {} has no usable period",
            frame_rate
        ))),
    }
}

/// A live video stream captured from a frame source.
///
/// Cheap to clone; every call to [`MediaStream::open_track`] starts an
/// independent sampler.
#[derive(Clone)]
pub struct MediaStream {
    id: Uuid,
    source: Arc<dyn FrameSource>,
    frame_rate: Option<f64>,
    period: Duration,
    resolution: Resolution,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("frame_rate", &self.frame_rate)
            .field("resolution", &self.resolution)
            .finish()
    }
}

impl MediaStream {
    /// Capture a stream from `source`.
    ///
    /// With `frame_rate` set, a frame is sampled every period. Without it,
    /// frames are only emitted when the source changed.
    pub fn capture(source: Arc<dyn FrameSource>, frame_rate: Option<f64>) -> CaptureResult<Self> {
        let period = sample_period(frame_rate.unwrap_or(CHANGE_POLL_HZ))?;

        source.check_capturable()?;
        let resolution = source.dimensions();

        let stream = Self {
            id: Uuid::new_v4(),
            source,
            frame_rate,
            period,
            resolution,
        };
        tracing::debug!(
            "Captured stream {} ({}x{}, {:?} fps)",
            stream.id,
            resolution.width,
            resolution.height,
            frame_rate
        );
        Ok(stream)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    /// Interval between samples
    pub fn frame_period(&self) -> Duration {
        self.period
    }

    /// Resolution the stream was captured at
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Start sampling the source.
    ///
    /// Must be called from within a tokio runtime. The sampler stops once the
    /// returned receiver is dropped. Frames are dropped rather than queued
    /// when the consumer falls behind.
    pub fn open_track(&self) -> FrameReceiver {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let source = self.source.clone();
        let only_on_change = self.frame_rate.is_none();
        let period = self.period;
        let stream_id = self.id;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_generation = None;
            let mut dropped = 0u64;

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }

                let generation = source.generation();
                if only_on_change && last_generation == Some(generation) {
                    continue;
                }
                last_generation = Some(generation);

                match tx.try_send(source.snapshot()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => dropped += 1,
                    Err(TrySendError::Closed(_)) => break,
                }
            }

            if dropped > 0 {
                tracing::warn!("Track on stream {} dropped {} frames", stream_id, dropped);
            }
            tracing::debug!("Track on stream {} closed", stream_id);
        });

        rx
    }
}
