//! Encoding and delivery
//!
//! This module provides the FFmpeg-backed recorder, media type handling and
//! delivery of finished recordings as files.

pub mod download;
pub mod ffmpeg;
pub mod types;

pub use download::{deliver, sanitize_filename, DEFAULT_FILENAME};
pub use ffmpeg::FfmpegRecorder;
pub use types::{
    is_type_supported, Artifact, Container, MediaType, SavedArtifact, VideoCodec,
    DEFAULT_BITS_PER_SECOND,
};
