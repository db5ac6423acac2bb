//! Recording state management
//!
//! Defines the recorder state machine, recorder options and session tracking.

use super::buffer::{ChunkBuffer, Fragment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use std::time::Instant;
use uuid::Uuid;

/// Media type recorded when none is configured
pub const DEFAULT_MIME_TYPE: &str = "video/webm";

/// Current state of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Configured, never started
    Inactive,
    /// Currently recording
    Recording,
    /// Recording finished
    Stopped,
}

impl Default for RecorderState {
    fn default() -> Self {
        Self::Inactive
    }
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecorderState::Inactive => "inactive",
            RecorderState::Recording => "recording",
            RecorderState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Options for configuring a recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
    /// Encoder bitrate in bits per second
    #[serde(default, alias = "videoBitsPerSecond")]
    pub target_bits_per_second: Option<NonZeroU64>,

    /// Container and codec, e.g. `video/webm;codecs=vp9`
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_string()
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            target_bits_per_second: None,
            mime_type: default_mime_type(),
        }
    }
}

impl RecorderOptions {
    /// Parse options from a JSON object such as
    /// `{"mimeType": "video/webm", "targetBitsPerSecond": 2500000}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One start→stop recording session.
///
/// Every successful start creates a new session with its own buffer, so
/// fragments never leak from one recording into the next.
#[derive(Debug)]
pub struct RecordingSession {
    /// Unique session ID
    pub id: Uuid,

    /// Wall clock time the session started
    pub started_at: DateTime<Utc>,

    /// Wall clock time the session stopped
    pub stopped_at: Option<DateTime<Utc>>,

    /// Fragments received so far
    pub buffer: ChunkBuffer,

    /// Monotonic start, for duration
    started: Instant,

    /// Duration once stopped
    duration_ms: Option<f64>,
}

impl RecordingSession {
    /// Create a new session starting now
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            stopped_at: None,
            buffer: ChunkBuffer::new(),
            started: Instant::now(),
            duration_ms: None,
        }
    }

    /// Append a fragment the recorder emitted, returning the fragment count
    pub fn on_data_available(&mut self, fragment: Fragment) -> usize {
        let size = fragment.len();
        let count = self.buffer.push(fragment);
        tracing::debug!("Session {}: {} fragments buffered (+{} bytes)", self.id, count, size);
        count
    }

    /// End the session
    pub fn end(&mut self) {
        self.stopped_at = Some(Utc::now());
        self.duration_ms = Some(self.started.elapsed().as_secs_f64() * 1000.0);
    }

    /// Elapsed time, frozen once the session has ended
    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
            .unwrap_or_else(|| self.started.elapsed().as_secs_f64() * 1000.0)
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a completed recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session that was stopped
    pub session_id: Uuid,

    /// Total duration in milliseconds
    pub duration_ms: f64,

    /// Number of fragments buffered
    pub fragment_count: usize,

    /// Sum of fragment sizes
    pub total_bytes: usize,

    /// Media type the artifact will be tagged with
    pub mime_type: String,
}
