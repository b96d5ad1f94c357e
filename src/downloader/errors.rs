// Error types for the download orchestrator

use std::path::PathBuf;

use thiserror::Error;

use super::extractors::diagnose_error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DownloadError {
    /// Malformed or unsupported URL, missing or invalid parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// yt-dlp failed during probe or download
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// ffmpeg failed while trimming
    #[error("Trim failed: {0}")]
    TrimFailed(String),

    /// Downloaded file could not be located for trimming
    #[error("Trim failed: file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Unknown job identifier
    #[error("Download not found")]
    NotFound,

    /// Job was cancelled by the caller; reported as a status, not an error
    #[error("Download cancelled")]
    Cancelled,

    /// yt-dlp or ffmpeg could not be started
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DownloadError {
    /// Build an `ExtractionFailed` from raw yt-dlp stderr, prefixed with a
    /// diagnosis when the output matches a known failure.
    pub fn from_extractor_output(stderr: &str) -> Self {
        let detail = last_error_line(stderr);
        match diagnose_error(stderr) {
            Some(reason) if !reason.is_unknown() => {
                Self::ExtractionFailed(format!("{}: {}", reason.description(), detail))
            }
            _ => Self::ExtractionFailed(detail),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// yt-dlp prints warnings before the actual error; prefer the `ERROR:` line.
fn last_error_line(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "yt-dlp exited without output".to_string();
    }

    trimmed
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with("ERROR:"))
        .or_else(|| trimmed.lines().last())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}
