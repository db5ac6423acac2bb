//! Media types and artifacts
//!
//! This module parses recordable media types into a container and codec
//! pair and defines the artifact produced from a recording.

use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};

/// Encoder bitrate used when none is configured
pub const DEFAULT_BITS_PER_SECOND: u64 = 2_500_000;

/// Container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Webm,
    Mp4,
    Matroska,
}

impl Container {
    fn from_essence(essence: &str) -> Option<Self> {
        match essence {
            "video/webm" => Some(Container::Webm),
            "video/mp4" => Some(Container::Mp4),
            "video/x-matroska" | "video/matroska" => Some(Container::Matroska),
            _ => None,
        }
    }

    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
            Container::Matroska => "mkv",
        }
    }

    /// FFmpeg muxer name
    pub fn muxer(&self) -> &'static str {
        match self {
            Container::Webm => "webm",
            Container::Mp4 => "mp4",
            Container::Matroska => "matroska",
        }
    }

    fn default_codec(&self) -> VideoCodec {
        match self {
            Container::Webm => VideoCodec::Vp8,
            Container::Mp4 | Container::Matroska => VideoCodec::H264,
        }
    }

    fn accepts(&self, codec: VideoCodec) -> bool {
        match self {
            Container::Webm => codec != VideoCodec::H264,
            Container::Mp4 => codec != VideoCodec::Vp8,
            Container::Matroska => true,
        }
    }
}

/// Video codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Vp8,
    Vp9,
    Av1,
    H264,
}

impl VideoCodec {
    /// Get the FFmpeg encoder for this codec
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::Vp8 => "libvpx",
            VideoCodec::Vp9 => "libvpx-vp9",
            VideoCodec::Av1 => "libaom-av1",
            VideoCodec::H264 => "libx264",
        }
    }

    /// Low-latency tuning flags for live input
    pub fn realtime_args(&self) -> &'static [&'static str] {
        match self {
            VideoCodec::Vp8 | VideoCodec::Vp9 => &["-deadline", "realtime", "-cpu-used", "8"],
            VideoCodec::Av1 => &["-usage", "realtime", "-cpu-used", "8"],
            VideoCodec::H264 => &["-preset", "veryfast", "-tune", "zerolatency"],
        }
    }
}

/// What a `codecs=` entry refers to
enum CodecEntry {
    Video(VideoCodec),
    Audio,
}

fn parse_codec(name: &str) -> Option<CodecEntry> {
    let name = name.trim().to_ascii_lowercase();
    let family = name.split('.').next().unwrap_or("");
    let entry = match family {
        "vp8" => CodecEntry::Video(VideoCodec::Vp8),
        "vp9" | "vp09" => CodecEntry::Video(VideoCodec::Vp9),
        "av1" | "av01" => CodecEntry::Video(VideoCodec::Av1),
        "h264" | "avc1" | "avc3" => CodecEntry::Video(VideoCodec::H264),
        "opus" | "vorbis" | "mp4a" | "pcm" | "aac" => CodecEntry::Audio,
        _ => return None,
    };
    Some(entry)
}

/// A parsed, recordable media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    container: Container,
    codec: VideoCodec,
}

impl MediaType {
    /// Parse a media type such as `video/webm` or `video/webm;codecs="vp9,opus"`
    pub fn parse(mime: &str) -> CaptureResult<Self> {
        let not_supported = || CaptureError::NotSupported(format!("media type '{}'", mime));

        let mut parts = mime.split(';');
        let essence = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let container = Container::from_essence(&essence).ok_or_else(not_supported)?;

        let mut codec = None;
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                return Err(not_supported());
            };
            if !key.trim().eq_ignore_ascii_case("codecs") {
                continue;
            }

            for name in value.trim().trim_matches('"').split(',') {
                match parse_codec(name) {
                    Some(CodecEntry::Video(found)) => {
                        if codec.replace(found).is_some() {
                            // Only one video track can be recorded
                            return Err(not_supported());
                        }
                    }
                    Some(CodecEntry::Audio) => {}
                    None => return Err(not_supported()),
                }
            }
        }

        let codec = codec.unwrap_or_else(|| container.default_codec());
        if !container.accepts(codec) {
            return Err(not_supported());
        }

        Ok(Self {
            essence,
            container,
            codec,
        })
    }

    /// Type without parameters, e.g. `video/webm`
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn container(&self) -> Container {
        self.container
    }

    pub fn codec(&self) -> VideoCodec {
        self.codec
    }
}

/// Whether `mime` can be recorded
pub fn is_type_supported(mime: &str) -> bool {
    MediaType::parse(mime).is_ok()
}

/// A finished recording, ready to be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Declared media type
    pub mime_type: String,
    /// Concatenated fragments
    pub data: Vec<u8>,
}

impl Artifact {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Where and how big a saved artifact ended up
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedArtifact {
    /// File written
    pub path: String,
    /// Bytes written
    pub size: usize,
    /// Declared media type
    pub mime_type: String,
}
