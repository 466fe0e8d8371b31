//! Clip trimming via the external ffmpeg tool.

use crate::correlate::TrimWindow;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Trim errors.
#[derive(Debug)]
pub enum TrimError {
    /// ffmpeg could not be executed (likely not installed)
    Command(String),
    /// ffmpeg ran but reported failure
    Failed { detail: String },
}

impl std::fmt::Display for TrimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrimError::Command(msg) => write!(f, "ffmpeg command error: {msg}"),
            TrimError::Failed { detail } => write!(f, "ffmpeg trim failed: {detail}"),
        }
    }
}

impl std::error::Error for TrimError {}

/// Capability to cut a sub-range out of a local video file.
pub trait ClipTrimmer {
    fn trim(&self, input: &Path, output: &Path, window: &TrimWindow) -> Result<(), TrimError>;
}

/// Trimmer backed by the ffmpeg command-line tool.
pub struct FfmpegTrimmer {
    ffmpeg: String,
}

impl FfmpegTrimmer {
    pub fn new() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
        }
    }

    /// Use a specific ffmpeg binary instead of whatever is on PATH.
    pub fn with_binary(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg = path.into();
        self
    }
}

impl Default for FfmpegTrimmer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipTrimmer for FfmpegTrimmer {
    fn trim(&self, input: &Path, output: &Path, window: &TrimWindow) -> Result<(), TrimError> {
        let start = window.start_timestamp();
        let end = window.end_timestamp();
        debug!(?input, ?output, %start, %end, "trimming clip");

        let result = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-i", &input.to_string_lossy()])
            .args(["-ss", &start, "-to", &end])
            .arg(output)
            .output()
            .map_err(|e| TrimError::Command(format!("failed to execute {}: {e}", self.ffmpeg)))?;

        if !result.status.success() {
            return Err(TrimError::Failed {
                detail: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
