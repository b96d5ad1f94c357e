// MediaExtractor trait and common types

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::errors::DownloadError;
use crate::downloader::progress::ProgressTick;

/// One entry of the `formats` array from `yt-dlp --dump-json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbedFormat {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

/// Raw metadata as reported by yt-dlp. Missing fields stay `None`;
/// defaults are applied when building `VideoInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaProbe {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub view_count: Option<u64>,
    #[serde(default)]
    pub formats: Vec<ProbedFormat>,
}

/// Option set for one download
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub url: String,
    /// yt-dlp format selector
    pub format: String,
    /// Output template, e.g. `/downloads/%(title)s.%(ext)s`
    pub output_template: String,
    /// Container to merge video+audio into
    pub merge_format: Option<String>,
    /// Post-process into an audio-only file
    pub extract_audio: Option<AudioExtraction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioExtraction {
    pub codec: String,
    pub quality: String,
}

/// Result of a completed fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Final path after merge/post-processing, when the engine reports one
    pub output_path: Option<PathBuf>,
}

/// What the hook tells the engine after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    /// Stop the transfer; the engine returns `DownloadError::Cancelled`
    Abort,
}

/// Called by the engine on every progress tick, including the finished one.
/// This is the only point where a running fetch can be interrupted.
pub trait ProgressHook: Send {
    fn on_tick(&mut self, tick: &ProgressTick) -> HookFlow;
}

/// Trait for extraction engines
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Read-only metadata probe
    async fn probe(&self, url: &str) -> Result<MediaProbe, DownloadError>;

    /// Download according to `options`, invoking `hook` per progress tick
    async fn fetch(
        &self,
        options: &FetchOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<FetchOutcome, DownloadError>;
}
