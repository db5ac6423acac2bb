//! Recorder capability
//!
//! A `MediaRecorder` turns a live stream into encoded fragments. The
//! controller never encodes anything itself; it only drives a recorder and
//! collects what it emits.

use super::buffer::Fragment;
use super::state::RecorderState;
use crate::capture::MediaStream;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Where a recorder delivers its fragments, in emission order.
pub type FragmentSink = mpsc::UnboundedSender<Fragment>;

/// Receiving end of a [`FragmentSink`].
pub type FragmentReceiver = mpsc::UnboundedReceiver<Fragment>;

/// Something that encodes a media stream into fragments.
///
/// Contract for implementations:
/// - `start` fails with `InvalidState` while already recording.
/// - `stop` fails with `InvalidState` unless recording.
/// - Once `stop` returns, every fragment of the session has been sent and
///   the sink has been dropped.
#[async_trait]
pub trait MediaRecorder: Send {
    /// Media type the recorder produces
    fn mime_type(&self) -> &str;

    /// Current recorder state
    fn state(&self) -> RecorderState;

    /// Begin encoding `stream`.
    ///
    /// With a timeslice, a fragment is emitted roughly every slice. Without
    /// one, output is held back until `stop`.
    async fn start(
        &mut self,
        stream: &MediaStream,
        sink: FragmentSink,
        timeslice: Option<Duration>,
    ) -> CaptureResult<()>;

    /// Finish encoding and flush the remaining output
    async fn stop(&mut self) -> CaptureResult<()>;
}

/// Create a connected sink/receiver pair
pub fn fragment_channel() -> (FragmentSink, FragmentReceiver) {
    mpsc::unbounded_channel()
}
