//! FFmpeg-backed recorder
//!
//! Raw RGBA frames go into an `ffmpeg` child on stdin; the muxed container
//! comes back on stdout and is handed out as fragments.

use crate::capture::{CapturedFrame, FrameReceiver, MediaStream, Resolution};
use crate::export::types::{Container, MediaType, DEFAULT_BITS_PER_SECOND};
use crate::recorder::buffer::Fragment;
use crate::recorder::channel::{FragmentSink, MediaRecorder};
use crate::recorder::state::{RecorderOptions, RecorderState};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Size of each stdout read
const READ_CHUNK: usize = 64 * 1024;

/// Build the FFmpeg argument list for encoding a live RGBA stream
pub fn build_encoder_args(
    media_type: &MediaType,
    bits_per_second: u64,
    resolution: Resolution,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        // Frames arrive live; stamp them as they come in
        "-use_wallclock_as_timestamps".into(),
        "1".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", resolution.width, resolution.height),
        "-i".into(),
        "-".into(),
        "-an".into(),
        "-c:v".into(),
        media_type.codec().encoder().into(),
        "-b:v".into(),
        bits_per_second.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];

    args.extend(media_type.codec().realtime_args().iter().map(|a| a.to_string()));

    if media_type.container() == Container::Mp4 {
        // Plain MP4 needs a seekable output for its index
        args.extend(["-movflags".into(), "frag_keyframe+empty_moov+default_base_moof".into()]);
    }

    args.extend([
        "-f".into(),
        media_type.container().muxer().into(),
        "pipe:1".into(),
    ]);
    args
}

struct ActiveEncode {
    child: Child,
    stop_tx: oneshot::Sender<()>,
    writer: JoinHandle<CaptureResult<u64>>,
    reader: JoinHandle<CaptureResult<usize>>,
    stderr: JoinHandle<String>,
}

/// Recorder that encodes through an `ffmpeg` process
pub struct FfmpegRecorder {
    mime_type: String,
    media_type: MediaType,
    bits_per_second: u64,
    ffmpeg_path: PathBuf,
    state: RecorderState,
    active: Option<ActiveEncode>,
}

impl FfmpegRecorder {
    /// Create a recorder for `options`, failing if the media type cannot be recorded
    pub fn new(options: &RecorderOptions) -> CaptureResult<Self> {
        let media_type = MediaType::parse(&options.mime_type)?;
        Ok(Self {
            mime_type: options.mime_type.trim().to_string(),
            media_type,
            bits_per_second: options
                .target_bits_per_second
                .map(|b| b.get())
                .unwrap_or(DEFAULT_BITS_PER_SECOND),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            state: RecorderState::Inactive,
            active: None,
        })
    }

    /// Use a specific FFmpeg executable
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn bits_per_second(&self) -> u64 {
        self.bits_per_second
    }
}

/// Forward frames to FFmpeg until told to stop or the track ends.
///
/// Frames that do not match `expected` are skipped, since FFmpeg reads a
/// fixed frame size. `stdin` is shut down on return.
async fn write_frames<W>(
    mut stdin: W,
    mut track: FrameReceiver,
    expected: Resolution,
    mut stop_rx: oneshot::Receiver<()>,
) -> CaptureResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let expected_len = CapturedFrame::byte_len(expected.width, expected.height);
    let mut written = 0u64;
    let mut skipped = 0u64;

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            frame = track.recv() => {
                let Some(frame) = frame else { break };
                if frame.width != expected.width
                    || frame.height != expected.height
                    || frame.data.len() != expected_len
                {
                    skipped += 1;
                    continue;
                }
                stdin
                    .write_all(&frame.data)
                    .await
                    .map_err(|e| CaptureError::Encoder(format!("Failed to write frame: {}", e)))?;
                written += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} frames that did not match {}x{}", skipped, expected.width, expected.height);
    }

    // Closing stdin signals EOF so FFmpeg finalizes the container
    stdin.shutdown().await.ok();
    drop(stdin);
    Ok(written)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn flush(pending: &mut Vec<u8>, sink: &FragmentSink, started: Instant) -> bool {
    if pending.is_empty() {
        return false;
    }
    let data = std::mem::take(pending);
    let timecode_ms = started.elapsed().as_secs_f64() * 1000.0;
    if sink.send(Fragment::new(data, timecode_ms)).is_err() {
        tracing::debug!("Fragment receiver gone, discarding output");
        return false;
    }
    true
}

/// Collect encoder output and emit it as fragments.
///
/// With a timeslice, whatever arrived during the slice is emitted at each
/// tick. Whatever is left is emitted at EOF. The sink is dropped on return.
async fn read_fragments<R>(
    mut stdout: R,
    sink: FragmentSink,
    timeslice: Option<Duration>,
    started: Instant,
) -> CaptureResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut ticker = timeslice.map(|slice| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + slice, slice);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut emitted = 0usize;

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => {
                let n = read.map_err(|e| CaptureError::Encoder(format!("Failed to read encoder output: {}", e)))?;
                if n == 0 {
                    break;
                }
                pending.extend_from_slice(&buf[..n]);
            }
            _ = next_tick(&mut ticker) => {
                if flush(&mut pending, &sink, started) {
                    emitted += 1;
                }
            }
        }
    }

    if flush(&mut pending, &sink, started) {
        emitted += 1;
    }
    Ok(emitted)
}

fn join_error(task: &str, e: tokio::task::JoinError) -> CaptureError {
    CaptureError::Encoder(format!("{} task failed: {}", task, e))
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn state(&self) -> RecorderState {
        self.state
    }

    async fn start(
        &mut self,
        stream: &MediaStream,
        sink: FragmentSink,
        timeslice: Option<Duration>,
    ) -> CaptureResult<()> {
        if self.state == RecorderState::Recording {
            return Err(CaptureError::InvalidState("recorder is already recording".into()));
        }

        let args = build_encoder_args(&self.media_type, self.bits_per_second, stream.resolution());
        tracing::info!("Starting FFmpeg recorder: {:?}", args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CaptureError::Encoder(format!("Failed to start {:?}: {}", self.ffmpeg_path, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::Encoder("Failed to capture FFmpeg stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Encoder("Failed to capture FFmpeg stdout".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::Encoder("Failed to capture FFmpeg stderr".into()))?;

        let started = Instant::now();
        let (stop_tx, stop_rx) = oneshot::channel();

        let writer = tokio::spawn(write_frames(
            stdin,
            stream.open_track(),
            stream.resolution(),
            stop_rx,
        ));
        let reader = tokio::spawn(read_fragments(stdout, sink, timeslice, started));
        let stderr = tokio::spawn(async move {
            let mut log = String::new();
            let _ = stderr.read_to_string(&mut log).await;
            log
        });

        self.active = Some(ActiveEncode {
            child,
            stop_tx,
            writer,
            reader,
            stderr,
        });
        self.state = RecorderState::Recording;
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        if self.state != RecorderState::Recording {
            return Err(CaptureError::InvalidState("recorder is not recording".into()));
        }
        let Some(mut active) = self.active.take() else {
            return Err(CaptureError::InvalidState("recorder is not recording".into()));
        };
        self.state = RecorderState::Stopped;

        let _ = active.stop_tx.send(());
        // Await both before bailing out so the sink is always dropped
        let frames = active.writer.await;
        let fragments = active.reader.await;
        let status = active
            .child
            .wait()
            .await
            .map_err(|e| CaptureError::Encoder(format!("Failed to wait for FFmpeg: {}", e)))?;
        let log = active.stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(CaptureError::Encoder(format!(
                "FFmpeg exited with {}: {}",
                status,
                log.trim()
            )));
        }
        let frames = frames.map_err(|e| join_error("Writer", e))??;
        let fragments = fragments.map_err(|e| join_error("Reader", e))??;

        tracing::info!(
            "FFmpeg recorder finished: {} frames in, {} fragments out",
            frames,
            fragments
        );
        Ok(())
    }
}
