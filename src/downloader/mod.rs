// Downloader module - yt-dlp/ffmpeg orchestration behind trait seams

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod metadata;
pub mod models;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod tools;
pub mod trim;
pub mod utils;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::DownloadError;
pub use extractors::{CliExtractor, MediaExtractor};
pub use metadata::fetch_video_info;
pub use models::{DownloadParams, DownloadRequest, JobStatus, ProgressRecord, VideoInfo};
pub use registry::JobRegistry;
pub use runner::{CancelFlag, DownloadRunner};
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use trim::{FfmpegTranscoder, MediaTranscoder};
pub use validate::is_supported_url;
