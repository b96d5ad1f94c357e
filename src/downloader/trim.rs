// Trim step - stream-copy a time window out of a downloaded file

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use super::errors::DownloadError;
use super::models::TimeRange;

/// Extensions yt-dlp may have switched to after merge or post-processing
pub const KNOWN_MEDIA_EXTENSIONS: [&str; 9] =
    ["mp4", "mkv", "webm", "m4a", "mp3", "ogg", "opus", "wav", "flac"];

/// Seconds from `HH:MM:SS`, `MM:SS` or bare seconds. Fields may be decimal.
pub fn parse_timestamp(value: &str) -> Result<f64, DownloadError> {
    let invalid = || DownloadError::InvalidInput(format!("Invalid timestamp: {}", value));

    let fields = value
        .trim()
        .split(':')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
        })
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(invalid)?;

    match fields.as_slice() {
        [h, m, s] => Ok(h * 3600.0 + m * 60.0 + s),
        [m, s] => Ok(m * 60.0 + s),
        [s] => Ok(*s),
        _ => Err(invalid()),
    }
}

/// Find the file yt-dlp actually wrote. Tries `expected` first, then the same
/// base path with each known media extension.
pub fn locate_media_file(expected: &Path) -> Result<PathBuf, DownloadError> {
    if expected.is_file() {
        return Ok(expected.to_path_buf());
    }

    KNOWN_MEDIA_EXTENSIONS
        .iter()
        .map(|ext| expected.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| DownloadError::FileNotFound(expected.to_path_buf()))
}

/// Sibling temp path keeping the extension so the muxer is inferred
fn temp_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}.trim-tmp.{}", stem, ext.to_string_lossy()),
        None => format!("{}.trim-tmp", stem),
    };
    path.with_file_name(name)
}

/// Trait for transcode engines
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Copy `range` of `input` into `output` without re-encoding
    async fn stream_copy(
        &self,
        input: &Path,
        range: TimeRange,
        output: &Path,
    ) -> Result<(), DownloadError>;
}

/// ffmpeg child-process transcoder
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    fn build_args(input: &Path, range: TimeRange, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];
        if let Some(start) = range.start {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", start));
        }
        if let Some(end) = range.end {
            args.push("-to".to_string());
            args.push(format!("{:.3}", end));
        }
        args.extend([
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ]);
        args
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn stream_copy(
        &self,
        input: &Path,
        range: TimeRange,
        output: &Path,
    ) -> Result<(), DownloadError> {
        let args = Self::build_args(input, range, output);
        tracing::debug!(ffmpeg = %self.ffmpeg_path.display(), ?args, "Running stream-copy trim");

        let result = TokioCommand::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DownloadError::TrimFailed(format!(
                    "failed to start {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        if result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr);
            Err(DownloadError::TrimFailed(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )))
        }
    }
}

/// Trim the file at `path` (or its extension-altered sibling) in place.
/// Returns the path of the file that was trimmed.
///
/// The original is only replaced after the transcoder succeeds; on failure
/// the temp file is removed and the original is left as downloaded.
pub async fn trim_in_place(
    transcoder: &dyn MediaTranscoder,
    path: &Path,
    range: TimeRange,
) -> Result<PathBuf, DownloadError> {
    let source = locate_media_file(path)?;
    let temp = temp_path_for(&source);

    tracing::info!(
        file = %source.display(),
        ?range,
        transcoder = transcoder.name(),
        "Trimming download"
    );

    if let Err(e) = transcoder.stream_copy(&source, range, &temp).await {
        if let Err(rm_err) = tokio::fs::remove_file(&temp).await {
            if rm_err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(file = %temp.display(), "Failed to remove temp file: {}", rm_err);
            }
        }
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp, &source).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(DownloadError::TrimFailed(format!(
            "could not replace {}: {}",
            source.display(),
            e
        )));
    }

    Ok(source)
}
