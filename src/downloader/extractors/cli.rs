// CLI extractor - drives the native `yt-dlp` binary
//
// Probe: `--dump-json`, bounded by a timeout.
// Fetch: progress ticks are printed through `--progress-template` and read
// line by line from both pipes; the hook decides after each tick whether the
// child keeps running.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;

use super::traits::{FetchOptions, FetchOutcome, HookFlow, MediaExtractor, MediaProbe, ProgressHook};
use crate::downloader::errors::DownloadError;
use crate::downloader::progress::{
    output_path_template, parse_output_line, parse_progress_line, progress_template,
};
use crate::downloader::utils::{forward_lines, run_output_with_timeout, tail, Stream};

/// How many stderr lines to keep for the error message
const STDERR_TAIL_LINES: usize = 50;

/// CLI-based extractor using the yt-dlp binary
pub struct CliExtractor {
    ytdlp_path: PathBuf,
    ffmpeg_location: Option<PathBuf>,
    probe_timeout_secs: u64,
}

impl CliExtractor {
    pub fn new(
        ytdlp_path: PathBuf,
        ffmpeg_location: Option<PathBuf>,
        probe_timeout_secs: u64,
    ) -> Self {
        Self {
            ytdlp_path,
            ffmpeg_location,
            probe_timeout_secs,
        }
    }

    fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "15".to_string(),
            "--retries".to_string(),
            "2".to_string(),
            url.to_string(),
        ]
    }

    fn fetch_args(&self, options: &FetchOptions) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--no-warnings".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            progress_template(),
            // --print implies --simulate unless told otherwise
            "--no-simulate".to_string(),
            "--print".to_string(),
            output_path_template(),
            "-f".to_string(),
            options.format.clone(),
            "-o".to_string(),
            options.output_template.clone(),
        ];

        if let Some(container) = &options.merge_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        if let Some(audio) = &options.extract_audio {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                audio.codec.clone(),
                "--audio-quality".to_string(),
                audio.quality.clone(),
            ]);
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().to_string());
        }

        args.push(options.url.clone());
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> DownloadError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DownloadError::ToolNotFound(format!(
                "yt-dlp not found at {}",
                self.ytdlp_path.display()
            ))
        } else {
            DownloadError::ExtractionFailed(format!("Failed to start yt-dlp: {}", e))
        }
    }
}

#[async_trait]
impl MediaExtractor for CliExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn probe(&self, url: &str) -> Result<MediaProbe, DownloadError> {
        let args = self.probe_args(url);
        tracing::debug!(ytdlp = %self.ytdlp_path.display(), ?args, "Probing");

        let output = run_output_with_timeout(&self.ytdlp_path, args, self.probe_timeout_secs)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => {
                    DownloadError::from_extractor_output(&e.to_string())
                }
                _ => self.spawn_error(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(url, "yt-dlp probe failed: {}", stderr.trim());
            return Err(DownloadError::from_extractor_output(&stderr));
        }

        serde_json::from_slice::<MediaProbe>(&output.stdout).map_err(|e| {
            DownloadError::ExtractionFailed(format!("Invalid JSON from yt-dlp: {}", e))
        })
    }

    async fn fetch(
        &self,
        options: &FetchOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<FetchOutcome, DownloadError> {
        let args = self.fetch_args(options);
        tracing::debug!(ytdlp = %self.ytdlp_path.display(), ?args, "Starting download");

        let mut child = TokioCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            DownloadError::ExtractionFailed("Failed to capture stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            DownloadError::ExtractionFailed("Failed to capture stderr".to_string())
        })?;

        // With --print yt-dlp runs quiet and progress may land on either pipe
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stdout_task = forward_lines(stdout, Stream::Stdout, tx.clone());
        let stderr_task = forward_lines(stderr, Stream::Stderr, tx);

        let mut outcome = FetchOutcome::default();
        let mut stderr_lines: Vec<String> = Vec::new();

        while let Some((stream, line)) = rx.recv().await {
            if let Some(path) = parse_output_line(&line) {
                outcome.output_path = Some(path);
                continue;
            }

            if let Some(tick) = parse_progress_line(&line) {
                if hook.on_tick(&tick) == HookFlow::Abort {
                    tracing::info!(url = %options.url, "Hook aborted download, stopping yt-dlp");
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill yt-dlp: {}", e);
                    }
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(DownloadError::Cancelled);
                }
                continue;
            }

            tracing::trace!("[yt-dlp] {}", line);
            if stream == Stream::Stderr {
                stderr_lines.push(line);
                if stderr_lines.len() > STDERR_TAIL_LINES * 2 {
                    stderr_lines.drain(..STDERR_TAIL_LINES);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExtractionFailed(format!("Process error: {}", e)))?;

        if status.success() {
            Ok(outcome)
        } else {
            Err(DownloadError::from_extractor_output(&tail(
                &stderr_lines,
                STDERR_TAIL_LINES,
            )))
        }
    }
}
