//! Artifact delivery
//!
//! Writes an artifact into a download directory the way a browser download
//! would: the name is sanitized, the file appears atomically, and existing
//! files are never overwritten (`test.webm`, `test (1).webm`, ...).

use super::types::Artifact;
use crate::utils::error::{CaptureError, CaptureResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name used when none is given
pub const DEFAULT_FILENAME: &str = "test.webm";

/// Give up looking for a free name after this many attempts
const MAX_NAME_ATTEMPTS: usize = 10_000;

/// Make a user-supplied name safe to use as a single path component
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `name` with a ` (n)` suffix inserted before the extension
fn numbered_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

/// Write `artifact` into `dir` under `filename`, returning the final path
pub fn deliver(artifact: &Artifact, dir: &Path, filename: &str) -> CaptureResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let name = sanitize_filename(filename);

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&artifact.data)?;
    file.flush()?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(&name, attempt));
        match file.persist_noclobber(&candidate) {
            Ok(_) => {
                tracing::info!(
                    "Saved {} bytes of {} to {:?}",
                    artifact.size(),
                    artifact.mime_type,
                    candidate
                );
                return Ok(candidate);
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                file = e.file;
            }
            Err(e) => return Err(e.error.into()),
        }
    }

    Err(CaptureError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for '{}' in {:?}", name, dir),
    )))
}
