// Common data models for the download orchestrator

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::trim::parse_timestamp;
use super::validate::ensure_supported_url;

/// What to produce from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    #[default]
    Video,
    Audio,
}

impl FromStr for DownloadMode {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(DownloadError::InvalidInput(format!("Unknown mode: {}", other))),
        }
    }
}

/// Quality tiers, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityTier {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl QualityTier {
    /// Every tier in descending resolution order, `Best` first
    pub const ALL: [QualityTier; 7] = [
        Self::Best,
        Self::P2160,
        Self::P1440,
        Self::P1080,
        Self::P720,
        Self::P480,
        Self::P360,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::P2160 => "2160p",
            Self::P1440 => "1440p",
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
        }
    }

    /// Height ceiling in pixels; `None` for unbounded
    pub fn height(&self) -> Option<u32> {
        match self {
            Self::Best => None,
            Self::P2160 => Some(2160),
            Self::P1440 => Some(1440),
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == s)
            .ok_or_else(|| DownloadError::InvalidInput(format!("Unknown quality: {}", s)))
    }
}

/// Container formats yt-dlp can merge into
pub const VIDEO_FORMATS: [&str; 3] = ["mp4", "webm", "mkv"];

/// Codecs yt-dlp can extract audio into
pub const AUDIO_FORMATS: [&str; 5] = ["mp3", "m4a", "ogg", "wav", "flac"];

/// Fixed audio quality target passed to the extractor
pub const AUDIO_QUALITY: &str = "192K";

/// Download parameters as received from a caller (camelCase JSON)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    pub url: Option<String>,
    pub output_dir: Option<String>,
    pub mode: Option<String>,
    pub video_format: Option<String>,
    pub audio_format: Option<String>,
    pub quality: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Optional trim window in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimeRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Validated download request
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub mode: DownloadMode,
    pub video_format: String,
    pub audio_format: String,
    pub quality: QualityTier,
    pub range: TimeRange,
}

impl DownloadRequest {
    /// Minimal video request with defaults, mostly for callers that build
    /// requests in code.
    pub fn video(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.into(),
            mode: DownloadMode::Video,
            video_format: VIDEO_FORMATS[0].to_string(),
            audio_format: AUDIO_FORMATS[0].to_string(),
            quality: QualityTier::Best,
            range: TimeRange::default(),
        }
    }
}

impl TryFrom<DownloadParams> for DownloadRequest {
    type Error = DownloadError;

    fn try_from(params: DownloadParams) -> Result<Self, Self::Error> {
        let missing = || DownloadError::InvalidInput("URL and outputDir are required".to_string());
        let url = non_empty(params.url).ok_or_else(missing)?;
        let output_dir = non_empty(params.output_dir).ok_or_else(missing)?;
        ensure_supported_url(&url)?;

        let mode = match non_empty(params.mode) {
            Some(m) => m.parse()?,
            None => DownloadMode::default(),
        };
        let quality = match non_empty(params.quality) {
            Some(q) => q.parse()?,
            None => QualityTier::default(),
        };
        let video_format = pick_format(params.video_format, &VIDEO_FORMATS, "video format")?;
        let audio_format = pick_format(params.audio_format, &AUDIO_FORMATS, "audio format")?;

        let range = TimeRange {
            start: non_empty(params.start_time)
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            end: non_empty(params.end_time)
                .map(|s| parse_timestamp(&s))
                .transpose()?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if end <= start {
                return Err(DownloadError::InvalidInput(
                    "endTime must be after startTime".to_string(),
                ));
            }
        }

        Ok(Self {
            url,
            output_dir: PathBuf::from(output_dir),
            mode,
            video_format,
            audio_format,
            quality,
            range,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn pick_format(
    value: Option<String>,
    allowed: &[&str],
    what: &str,
) -> Result<String, DownloadError> {
    match non_empty(value) {
        None => Ok(allowed[0].to_string()),
        Some(v) => {
            let lower = v.to_lowercase();
            if allowed.contains(&lower.as_str()) {
                Ok(lower)
            } else {
                Err(DownloadError::InvalidInput(format!("Unsupported {}: {}", what, v)))
            }
        }
    }
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted on the wire; jobs are seeded as `Downloading`
    Queued,
    Downloading,
    Processing,
    Complete,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Error)
    }
}

/// Latest known state of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub download_id: String,
    pub status: JobStatus,
    pub progress: f32,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl ProgressRecord {
    /// Record seeded when a job is accepted
    pub fn started(download_id: impl Into<String>) -> Self {
        Self {
            download_id: download_id.into(),
            status: JobStatus::Downloading,
            progress: 0.0,
            speed: None,
            eta: None,
            filename: None,
            error: None,
        }
    }
}

/// Normalized metadata returned by the info endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration: f64,
    pub channel: String,
    pub upload_date: String,
    pub view_count: u64,
    pub available_qualities: Vec<String>,
    pub available_video_formats: Vec<String>,
    pub available_audio_formats: Vec<String>,
}
