//! Scripted recorder for tests
//!
//! Emits exactly the fragments the test hands it, so controller behavior can
//! be checked without an encoder.

use super::buffer::Fragment;
use super::channel::{FragmentSink, MediaRecorder};
use super::state::RecorderState;
use crate::capture::MediaStream;
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Shared {
    sink: Option<FragmentSink>,
    emitted: usize,
    starts: usize,
    last_timeslice: Option<Duration>,
}

/// Recorder whose output is driven by a [`ScriptedHandle`]
pub struct ScriptedRecorder {
    mime_type: String,
    state: RecorderState,
    shared: Arc<Mutex<Shared>>,
    /// Emitted on stop, like a container trailer
    trailer: Option<Vec<u8>>,
}

/// Test-side handle for pushing fragments into a running recorder
#[derive(Clone)]
pub struct ScriptedHandle {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedRecorder {
    pub fn new(mime_type: &str) -> (Self, ScriptedHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let recorder = Self {
            mime_type: mime_type.to_string(),
            state: RecorderState::Inactive,
            shared: shared.clone(),
            trailer: None,
        };
        (recorder, ScriptedHandle { shared })
    }

    pub fn with_trailer(mut self, trailer: Vec<u8>) -> Self {
        self.trailer = Some(trailer);
        self
    }
}

impl ScriptedHandle {
    /// Emit one fragment; returns false if no session is listening
    pub fn emit(&self, data: &[u8]) -> bool {
        let mut shared = self.shared.lock();
        let timecode = shared.emitted as f64;
        let Some(sink) = shared.sink.as_ref() else {
            return false;
        };
        let sent = sink.send(Fragment::new(data.to_vec(), timecode)).is_ok();
        if sent {
            shared.emitted += 1;
        }
        sent
    }

    pub fn starts(&self) -> usize {
        self.shared.lock().starts
    }

    pub fn last_timeslice(&self) -> Option<Duration> {
        self.shared.lock().last_timeslice
    }
}

#[async_trait]
impl MediaRecorder for ScriptedRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    async fn start(
        &mut self,
        _stream: &MediaStream,
        sink: FragmentSink,
        timeslice: Option<Duration>,
    ) -> CaptureResult<()> {
        if self.state == RecorderState::Recording {
            return Err(CaptureError::InvalidState("already recording".into()));
        }
        let mut shared = self.shared.lock();
        shared.sink = Some(sink);
        shared.starts += 1;
        shared.last_timeslice = timeslice;
        self.state = RecorderState::Recording;
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        if self.state != RecorderState::Recording {
            return Err(CaptureError::InvalidState("not recording".into()));
        }
        let mut shared = self.shared.lock();
        if let (Some(trailer), Some(sink)) = (self.trailer.as_ref(), shared.sink.as_ref()) {
            let _ = sink.send(Fragment::new(trailer.clone(), shared.emitted as f64));
        }
        shared.sink = None;
        self.state = RecorderState::Stopped;
        Ok(())
    }
}
