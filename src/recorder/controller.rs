//! Capture controller
//!
//! Binds a frame source to a recorder, keeps the fragments of the current
//! session and turns them into a downloadable file.

use super::buffer::Fragment;
use super::channel::{fragment_channel, FragmentReceiver, MediaRecorder};
use super::state::{RecorderOptions, RecorderState, RecordingSession, SessionSummary, DEFAULT_MIME_TYPE};
use crate::capture::{FrameSource, MediaStream};
use crate::export::download::{deliver, DEFAULT_FILENAME};
use crate::export::ffmpeg::FfmpegRecorder;
use crate::export::types::{Artifact, SavedArtifact};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// A session started
    Started { session_id: Uuid },
    /// A fragment was buffered
    DataAvailable {
        session_id: Uuid,
        fragment_count: usize,
        size: usize,
    },
    /// A session stopped and its buffer is complete
    Stopped(SessionSummary),
    /// An artifact was written
    Saved(SavedArtifact),
}

/// Drives one recorder over one stream, one session at a time
pub struct CaptureController {
    /// Stream every session records from
    stream: MediaStream,

    /// Recorder doing the encoding
    recorder: Box<dyn MediaRecorder>,

    /// Media type artifacts are tagged with
    mime_type: String,

    /// Directory saved files go to
    download_dir: PathBuf,

    /// Current (or last finished) session
    session: Option<Arc<Mutex<RecordingSession>>>,

    /// Task feeding the session buffer while recording
    drain: Option<JoinHandle<usize>>,

    /// Event broadcaster
    event_tx: broadcast::Sender<RecordingEvent>,
}

/// Deliver fragments into the session buffer until the recorder drops its sink
async fn drain_fragments(
    mut rx: FragmentReceiver,
    session: Arc<Mutex<RecordingSession>>,
    event_tx: broadcast::Sender<RecordingEvent>,
) -> usize {
    let mut delivered = 0;
    while let Some(fragment) = rx.recv().await {
        let size = fragment.len();
        let (session_id, fragment_count) = {
            let mut session = session.lock();
            (session.id, session.on_data_available(fragment))
        };
        delivered += 1;
        let _ = event_tx.send(RecordingEvent::DataAvailable {
            session_id,
            fragment_count,
            size,
        });
    }
    delivered
}

impl CaptureController {
    /// Capture `source` and record it with FFmpeg according to `options`.
    ///
    /// The stream emits a frame whenever the source changes.
    pub fn configure(source: Arc<dyn FrameSource>, options: RecorderOptions) -> CaptureResult<Self> {
        let recorder = FfmpegRecorder::new(&options)?;
        Self::configure_with(source, options, Box::new(recorder))
    }

    /// Capture `source` and record it with the given recorder
    pub fn configure_with(
        source: Arc<dyn FrameSource>,
        options: RecorderOptions,
        recorder: Box<dyn MediaRecorder>,
    ) -> CaptureResult<Self> {
        let stream = MediaStream::capture(source, None)?;
        Self::from_stream(stream, options, recorder)
    }

    /// Record an already captured stream.
    ///
    /// Artifacts are tagged with the recorder's media type; a different
    /// `mimeType` in `options` is rejected.
    pub fn from_stream(
        stream: MediaStream,
        options: RecorderOptions,
        recorder: Box<dyn MediaRecorder>,
    ) -> CaptureResult<Self> {
        let requested = match options.mime_type.trim() {
            "" => DEFAULT_MIME_TYPE,
            mime => mime,
        };
        let mime_type = recorder.mime_type().trim().to_string();
        if !requested.eq_ignore_ascii_case(&mime_type) {
            return Err(CaptureError::NotSupported(format!(
                "recorder produces {}, not {}",
                mime_type, requested
            )));
        }
        let (event_tx, _) = broadcast::channel(100);

        tracing::info!(
            "Configured {} recorder on stream {}",
            recorder.mime_type(),
            stream.id()
        );

        Ok(Self {
            stream,
            recorder,
            mime_type,
            download_dir: PathBuf::from("."),
            session: None,
            drain: None,
            event_tx,
        })
    }

    /// Save files into `dir` instead of the working directory
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Get the current recorder state
    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// ID of the current or last session
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.lock().id)
    }

    /// Duration of the current or last session in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.session
            .as_ref()
            .map(|s| s.lock().duration_ms())
            .unwrap_or(0.0)
    }

    /// Number of fragments buffered in the current session
    pub fn fragment_count(&self) -> usize {
        self.session.as_ref().map(|s| s.lock().buffer.len()).unwrap_or(0)
    }

    /// Bytes buffered in the current session
    pub fn buffered_bytes(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.lock().buffer.total_bytes())
            .unwrap_or(0)
    }

    /// Copy of the fragments buffered in the current session
    pub fn fragments(&self) -> Vec<Fragment> {
        self.session
            .as_ref()
            .map(|s| s.lock().buffer.fragments().to_vec())
            .unwrap_or_default()
    }

    /// Start recording; output is emitted when the recording stops
    pub async fn start(&mut self) -> CaptureResult<()> {
        self.begin(None).await
    }

    /// Start recording, emitting a fragment roughly every `timeslice`
    pub async fn start_with_timeslice(&mut self, timeslice: Duration) -> CaptureResult<()> {
        if timeslice.is_zero() {
            return Err(CaptureError::InvalidConfig("timeslice must be positive".into()));
        }
        self.begin(Some(timeslice)).await
    }

    async fn begin(&mut self, timeslice: Option<Duration>) -> CaptureResult<()> {
        if self.recorder.state() == RecorderState::Recording {
            return Err(CaptureError::InvalidState(
                "start() called while already recording".into(),
            ));
        }

        let session = RecordingSession::new();
        let session_id = session.id;
        let (sink, rx) = fragment_channel();

        self.recorder.start(&self.stream, sink, timeslice).await?;

        // Only now does the previous session go away
        let session = Arc::new(Mutex::new(session));
        self.drain = Some(tokio::spawn(drain_fragments(
            rx,
            session.clone(),
            self.event_tx.clone(),
        )));
        self.session = Some(session);

        let _ = self.event_tx.send(RecordingEvent::Started { session_id });
        tracing::info!("Recording started (session {}, timeslice {:?})", session_id, timeslice);
        Ok(())
    }

    /// Stop recording and wait until every fragment is buffered
    pub async fn stop(&mut self) -> CaptureResult<SessionSummary> {
        if self.recorder.state() != RecorderState::Recording {
            return Err(CaptureError::InvalidState(
                "stop() called while not recording".into(),
            ));
        }

        tracing::info!("Stopping recording");
        let stopped = self.recorder.stop().await;

        // The recorder has dropped its sink, so the drain runs dry
        if let Some(drain) = self.drain.take() {
            let delivered = drain
                .await
                .map_err(|e| CaptureError::Recorder(format!("fragment delivery failed: {}", e)))?;
            tracing::debug!("Drained {} fragments", delivered);
        }

        let session = self
            .session
            .as_ref()
            .ok_or_else(|| CaptureError::InvalidState("no session to stop".into()))?;
        let summary = {
            let mut session = session.lock();
            session.end();
            SessionSummary {
                session_id: session.id,
                duration_ms: session.duration_ms(),
                fragment_count: session.buffer.len(),
                total_bytes: session.buffer.total_bytes(),
                mime_type: self.mime_type.clone(),
            }
        };
        stopped?;

        let _ = self.event_tx.send(RecordingEvent::Stopped(summary.clone()));
        tracing::info!(
            "Recording stopped. Duration: {:.0}ms, {} fragments, {} bytes",
            summary.duration_ms,
            summary.fragment_count,
            summary.total_bytes
        );
        Ok(summary)
    }

    /// Assemble the buffered fragments into one artifact.
    ///
    /// Refused while recording, since a half-written container is usually
    /// unreadable, and refused when the buffer holds no bytes.
    pub fn artifact(&self) -> CaptureResult<Artifact> {
        if self.recorder.state() == RecorderState::Recording {
            return Err(CaptureError::InvalidState(
                "save() called while recording, call stop() first".into(),
            ));
        }

        let data = self.session.as_ref().and_then(|session| {
            let session = session.lock();
            (session.buffer.total_bytes() > 0).then(|| session.buffer.concat())
        });
        let Some(data) = data else {
            tracing::warn!("Nothing recorded, not producing an empty file");
            return Err(CaptureError::EmptyBuffer);
        };

        Ok(Artifact {
            mime_type: self.mime_type.clone(),
            data,
        })
    }

    /// Save the recording into the download directory.
    ///
    /// `filename` defaults to `test.webm`. An existing file is never
    /// overwritten; a numbered name is picked instead.
    pub fn save(&self, filename: Option<&str>) -> CaptureResult<SavedArtifact> {
        let artifact = self.artifact()?;
        let path = deliver(&artifact, &self.download_dir, filename.unwrap_or(DEFAULT_FILENAME))?;

        let saved = SavedArtifact {
            path: path.to_string_lossy().to_string(),
            size: artifact.size(),
            mime_type: artifact.mime_type,
        };
        let _ = self.event_tx.send(RecordingEvent::Saved(saved.clone()));
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Canvas;
    use crate::recorder::testing::{ScriptedHandle, ScriptedRecorder};
    use std::fs;
    use tempfile::tempdir;

    fn controller(mime: &str) -> (CaptureController, ScriptedHandle) {
        let (recorder, handle) = ScriptedRecorder::new(mime);
        let options = RecorderOptions {
            mime_type: mime.to_string(),
            ..Default::default()
        };
        let controller =
            CaptureController::configure_with(Arc::new(Canvas::new(8, 8)), options, Box::new(recorder))
                .unwrap();
        (controller, handle)
    }

    #[test]
    fn test_configure_rejects_uncapturable_source() {
        let canvas = Canvas::new(8, 8);
        canvas.mark_tainted();
        let (recorder, _) = ScriptedRecorder::new("video/webm");

        let result = CaptureController::configure_with(
            Arc::new(canvas),
            RecorderOptions::default(),
            Box::new(recorder),
        );
        assert!(matches!(result, Err(CaptureError::CaptureUnsupported(_))));
    }

    #[test]
    fn test_configure_rejects_unsupported_mime_type() {
        let options = RecorderOptions {
            mime_type: "video/quicktime".into(),
            ..Default::default()
        };
        let result = CaptureController::configure(Arc::new(Canvas::new(8, 8)), options);
        assert!(matches!(result, Err(CaptureError::NotSupported(_))));
    }

    #[tokio::test]
    async fn test_fragments_buffered_in_emission_order() {
        let (mut controller, handle) = controller("video/webm");
        controller.start().await.unwrap();
        assert_eq!(controller.state(), RecorderState::Recording);

        for i in 0..50u8 {
            // Repeats on purpose: nothing may be deduplicated
            assert!(handle.emit(&[i / 2]));
        }
        controller.stop().await.unwrap();

        let fragments = controller.fragments();
        assert_eq!(fragments.len(), 50);
        for (i, fragment) in fragments.iter().enumerate() {
            assert_eq!(fragment.data, vec![i as u8 / 2]);
        }
    }

    #[tokio::test]
    async fn test_artifact_is_concatenation() {
        let (mut controller, handle) = controller("video/webm");
        controller.start().await.unwrap();
        handle.emit(b"A");
        handle.emit(b"BB");
        handle.emit(b"CCC");
        controller.stop().await.unwrap();

        let artifact = controller.artifact().unwrap();
        assert_eq!(artifact.data, b"ABBCCC".to_vec());
        assert_eq!(artifact.mime_type, "video/webm");
    }

    #[tokio::test]
    async fn test_double_start_is_invalid_and_keeps_buffer() {
        let (mut controller, handle) = controller("video/webm");
        controller.start().await.unwrap();
        handle.emit(b"keep");
        let session = controller.session_id();

        assert!(matches!(
            controller.start().await,
            Err(CaptureError::InvalidState(_))
        ));
        assert_eq!(controller.session_id(), session);
        assert_eq!(handle.starts(), 1);

        handle.emit(b"-me");
        controller.stop().await.unwrap();
        assert_eq!(controller.artifact().unwrap().data, b"keep-me".to_vec());
    }

    #[tokio::test]
    async fn test_stop_when_not_recording_is_invalid() {
        let (mut controller, _) = controller("video/webm");
        assert!(matches!(
            controller.stop().await,
            Err(CaptureError::InvalidState(_))
        ));

        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), RecorderState::Stopped);
        assert!(matches!(
            controller.stop().await,
            Err(CaptureError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_save_with_nothing_recorded_is_rejected() {
        let dir = tempdir().unwrap();
        let (mut controller, _) = controller("video/webm");
        controller = controller.with_download_dir(dir.path());

        // Never started
        assert!(matches!(controller.save(None), Err(CaptureError::EmptyBuffer)));

        // Started and stopped without output
        controller.start().await.unwrap();
        controller.stop().await.unwrap();
        assert!(matches!(controller.save(None), Err(CaptureError::EmptyBuffer)));

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_save_with_only_empty_fragments_is_rejected() {
        let dir = tempdir().unwrap();
        let (controller, handle) = controller("video/webm");
        let mut controller = controller.with_download_dir(dir.path());

        controller.start().await.unwrap();
        assert!(handle.emit(&[]));
        assert!(handle.emit(&[]));
        let summary = controller.stop().await.unwrap();
        assert_eq!(summary.fragment_count, 2);
        assert_eq!(summary.total_bytes, 0);

        assert!(matches!(controller.save(None), Err(CaptureError::EmptyBuffer)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_artifacts_tagged_with_recorder_type() {
        let (recorder, _) = ScriptedRecorder::new("video/mp4");
        let options = RecorderOptions {
            mime_type: "VIDEO/MP4".into(),
            ..Default::default()
        };
        let controller =
            CaptureController::configure_with(Arc::new(Canvas::new(8, 8)), options, Box::new(recorder))
                .unwrap();
        assert_eq!(controller.mime_type(), "video/mp4");
    }

    #[test]
    fn test_configure_rejects_type_recorder_does_not_produce() {
        // Default options ask for video/webm
        let (recorder, _) = ScriptedRecorder::new("video/mp4");
        let result = CaptureController::configure_with(
            Arc::new(Canvas::new(8, 8)),
            RecorderOptions::default(),
            Box::new(recorder),
        );
        assert!(matches!(result, Err(CaptureError::NotSupported(_))));

        let (recorder, _) = ScriptedRecorder::new("video/webm");
        let options = RecorderOptions {
            mime_type: "video/quicktime".into(),
            ..Default::default()
        };
        let result =
            CaptureController::configure_with(Arc::new(Canvas::new(8, 8)), options, Box::new(recorder));
        assert!(matches!(result, Err(CaptureError::NotSupported(_))));
    }

    #[tokio::test]
    async fn test_save_while_recording_is_rejected() {
        let dir = tempdir().unwrap();
        let (controller, handle) = controller("video/webm");
        let mut controller = controller.with_download_dir(dir.path());

        controller.start().await.unwrap();
        handle.emit(b"partial");
        assert!(matches!(
            controller.save(Some("early.webm")),
            Err(CaptureError::InvalidState(_))
        ));
        assert!(!dir.path().join("early.webm").exists());
    }

    #[tokio::test]
    async fn test_webm_scenario_sizes_and_type() {
        let dir = tempdir().unwrap();
        let (controller, handle) = controller("video/webm");
        let mut controller = controller.with_download_dir(dir.path());

        controller.start().await.unwrap();
        handle.emit(&[1u8; 100]);
        handle.emit(&[2u8; 200]);
        let summary = controller.stop().await.unwrap();
        assert_eq!(summary.fragment_count, 2);
        assert_eq!(summary.total_bytes, 300);

        let saved = controller.save(Some("out.webm")).unwrap();
        assert_eq!(saved.size, 300);
        assert_eq!(saved.mime_type, "video/webm");

        let written = fs::read(dir.path().join("out.webm")).unwrap();
        assert_eq!(written.len(), 300);
        assert!(written[..100].iter().all(|&b| b == 1));
        assert!(written[100..].iter().all(|&b| b == 2));
    }

    #[tokio::test]
    async fn test_stop_includes_final_fragment() {
        let (recorder, handle) = ScriptedRecorder::new("video/webm");
        let recorder = recorder.with_trailer(b"-end".to_vec());
        let mut controller = CaptureController::configure_with(
            Arc::new(Canvas::new(8, 8)),
            RecorderOptions::default(),
            Box::new(recorder),
        )
        .unwrap();

        controller.start().await.unwrap();
        handle.emit(b"body");
        let summary = controller.stop().await.unwrap();

        assert_eq!(summary.fragment_count, 2);
        assert_eq!(controller.artifact().unwrap().data, b"body-end".to_vec());
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak_into_each_other() {
        let dir = tempdir().unwrap();
        let (controller, handle) = controller("video/webm");
        let mut controller = controller.with_download_dir(dir.path());

        controller.start().await.unwrap();
        handle.emit(b"first-session");
        controller.stop().await.unwrap();
        let first = controller.save(None).unwrap();
        let first_id = controller.session_id();

        controller.start().await.unwrap();
        assert_ne!(controller.session_id(), first_id);
        assert_eq!(controller.fragment_count(), 0);
        handle.emit(b"second");
        controller.stop().await.unwrap();
        let second = controller.save(None).unwrap();

        assert_eq!(fs::read(&first.path).unwrap(), b"first-session");
        assert_eq!(fs::read(&second.path).unwrap(), b"second");
        assert!(second.path.ends_with("test (1).webm"));
    }

    #[tokio::test]
    async fn test_timeslice_is_passed_to_recorder() {
        let (mut controller, handle) = controller("video/webm");
        assert!(matches!(
            controller.start_with_timeslice(Duration::ZERO).await,
            Err(CaptureError::InvalidConfig(_))
        ));

        controller
            .start_with_timeslice(Duration::from_millis(250))
            .await
            .unwrap();
        assert_eq!(handle.last_timeslice(), Some(Duration::from_millis(250)));
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let dir = tempdir().unwrap();
        let (controller, handle) = controller("video/webm");
        let mut controller = controller.with_download_dir(dir.path());
        let mut events = controller.subscribe();

        controller.start().await.unwrap();
        handle.emit(b"abc");
        controller.stop().await.unwrap();
        controller.save(Some("clip.webm")).unwrap();

        assert!(matches!(events.recv().await.unwrap(), RecordingEvent::Started { .. }));
        match events.recv().await.unwrap() {
            RecordingEvent::DataAvailable {
                fragment_count,
                size,
                ..
            } => {
                assert_eq!(fragment_count, 1);
                assert_eq!(size, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
        match events.recv().await.unwrap() {
            RecordingEvent::Stopped(summary) => assert_eq!(summary.total_bytes, 3),
            other => panic!("unexpected event {:?}", other),
        }
        match events.recv().await.unwrap() {
            RecordingEvent::Saved(saved) => assert!(saved.path.ends_with("clip.webm")),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
