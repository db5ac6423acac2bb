//! Interactive console
//!
//! Line-oriented control surface for a capture controller. Accepts both
//! bare words (`start`, `stop`, `save out.webm`) and the call style used in
//! a browser console (`rec.start()`, `rec.stop()`, `save()`).

use crate::recorder::{CaptureController, RecorderState, RecordingEvent};
use crate::utils::error::{CaptureError, CaptureResult, ErrorResponse};
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

const HELP: &str = "\
commands:
  start [timeslice-ms]  start recording
  stop                  stop recording
  save [filename]       save the recording (default test.webm)
  status                show recorder status
  help                  show this help
  quit                  stop if needed and exit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start { timeslice: Option<Duration> },
    Stop,
    Save { filename: Option<String> },
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let word = word.strip_prefix("rec.").unwrap_or(word);
        let word = word.strip_suffix("()").unwrap_or(word);

        let command = match word.to_ascii_lowercase().as_str() {
            "start" => {
                let timeslice = if rest.is_empty() {
                    None
                } else {
                    let ms: u64 = rest
                        .parse()
                        .map_err(|_| format!("invalid timeslice '{}', expected milliseconds", rest))?;
                    Some(Duration::from_millis(ms))
                };
                ConsoleCommand::Start { timeslice }
            }
            "stop" => ConsoleCommand::Stop,
            "save" => ConsoleCommand::Save {
                filename: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

/// Snapshot of the controller for `status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: RecorderState,
    pub session_id: Option<Uuid>,
    pub fragments: usize,
    pub bytes: usize,
    pub duration_ms: f64,
    pub mime_type: String,
}

impl StatusReport {
    pub fn of(controller: &CaptureController) -> Self {
        Self {
            state: controller.state(),
            session_id: controller.session_id(),
            fragments: controller.fragment_count(),
            bytes: controller.buffered_bytes(),
            duration_ms: controller.duration_ms(),
            mime_type: controller.mime_type().to_string(),
        }
    }
}

/// Run one command, returning the text to show
pub async fn execute(controller: &mut CaptureController, command: &ConsoleCommand) -> CaptureResult<String> {
    match command {
        ConsoleCommand::Start { timeslice } => {
            match timeslice {
                Some(slice) => controller.start_with_timeslice(*slice).await?,
                None => controller.start().await?,
            }
            Ok("recording".to_string())
        }
        ConsoleCommand::Stop => {
            let summary = controller.stop().await?;
            Ok(format!(
                "stopped after {:.1}s, {} fragments ({} bytes)",
                summary.duration_ms / 1000.0,
                summary.fragment_count,
                summary.total_bytes
            ))
        }
        ConsoleCommand::Save { filename } => {
            let saved = controller.save(filename.as_deref())?;
            Ok(format!("saved {} ({} bytes, {})", saved.path, saved.size, saved.mime_type))
        }
        ConsoleCommand::Status => Ok(serde_json::to_string_pretty(&StatusReport::of(controller))?),
        ConsoleCommand::Help => Ok(HELP.to_string()),
        ConsoleCommand::Quit => Ok("bye".to_string()),
    }
}

fn render_error(error: CaptureError) -> String {
    let response = ErrorResponse::from(error);
    format!("error[{}]: {}", response.code, response.message)
}

/// Read commands from `input` until `quit` or EOF.
///
/// A recording still running at exit is stopped so the encoder can finish
/// its file.
pub async fn run_console<R, W>(
    controller: &mut CaptureController,
    input: R,
    mut output: W,
) -> CaptureResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let reply = match ConsoleCommand::parse(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => {
                let reply = match execute(controller, &command).await {
                    Ok(text) => text,
                    Err(e) => render_error(e),
                };
                if command == ConsoleCommand::Quit {
                    output.write_all(format!("{}\n", reply).as_bytes()).await?;
                    break;
                }
                reply
            }
            Err(message) => format!("error: {}", message),
        };
        output.write_all(format!("{}\n", reply).as_bytes()).await?;
        output.flush().await?;
    }

    if controller.state() == RecorderState::Recording {
        tracing::warn!("Console closed while recording, stopping");
        if let Err(e) = controller.stop().await {
            tracing::warn!("Failed to stop recording on exit: {}", e);
        }
    }
    output.flush().await?;
    Ok(())
}

/// Log recording events until the controller goes away.
///
/// A receiver that falls behind skips the events it missed and keeps going.
/// Returns the number of events logged.
pub async fn log_events(mut events: broadcast::Receiver<RecordingEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                match event {
                    RecordingEvent::DataAvailable { fragment_count, .. } => {
                        tracing::info!("{} fragments", fragment_count)
                    }
                    RecordingEvent::Saved(saved) => tracing::info!("Downloaded {}", saved.path),
                    other => tracing::debug!("{:?}", other),
                }
                logged += 1;
            }
            Err(RecvError::Lagged(missed)) => tracing::debug!("Missed {} events", missed),
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
