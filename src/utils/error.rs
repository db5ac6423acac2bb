//! Error types and handling
//!
//! Common error types used across the crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Capture unsupported: {0}")]
    CaptureUnsupported(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Nothing recorded yet, refusing to save an empty file")]
    EmptyBuffer,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Recorder error: {0}")]
    Recorder(String),
}

impl CaptureError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
            CaptureError::CaptureUnsupported(_) => "CAPTURE_UNSUPPORTED",
            CaptureError::InvalidState(_) => "INVALID_STATE_ERROR",
            CaptureError::EmptyBuffer => "EMPTY_BUFFER",
            CaptureError::NotSupported(_) => "NOT_SUPPORTED",
            CaptureError::InvalidConfig(_) => "INVALID_CONFIG",
            CaptureError::Encoder(_) => "ENCODER_ERROR",
            CaptureError::Recorder(_) => "RECORDER_ERROR",
        }
    }
}

/// Error response for the console
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
