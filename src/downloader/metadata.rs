// Metadata fetcher - read-only probe into a normalized VideoInfo

use super::errors::DownloadError;
use super::extractors::{MediaExtractor, MediaProbe};
use super::format_selector::FormatSelector;
use super::models::{VideoInfo, AUDIO_FORMATS, VIDEO_FORMATS};
use super::validate::ensure_supported_url;

/// Validate `url`, probe it and normalize the result
pub async fn fetch_video_info(
    extractor: &dyn MediaExtractor,
    url: &str,
) -> Result<VideoInfo, DownloadError> {
    ensure_supported_url(url)?;

    tracing::info!(url, extractor = extractor.name(), "Fetching video info");
    let probe = extractor.probe(url).await?;
    Ok(normalize(probe))
}

fn normalize(probe: MediaProbe) -> VideoInfo {
    let available_qualities = FormatSelector::available_qualities(&probe.formats);

    VideoInfo {
        id: probe.id.unwrap_or_default(),
        title: probe.title.unwrap_or_else(|| "Unknown".to_string()),
        description: probe.description.unwrap_or_default(),
        thumbnail: probe.thumbnail.unwrap_or_default(),
        duration: probe.duration.unwrap_or(0.0),
        channel: probe.uploader.unwrap_or_else(|| "Unknown".to_string()),
        upload_date: probe.upload_date.unwrap_or_default(),
        view_count: probe.view_count.unwrap_or(0),
        available_qualities,
        available_video_formats: VIDEO_FORMATS.iter().map(|s| s.to_string()).collect(),
        available_audio_formats: AUDIO_FORMATS.iter().map(|s| s.to_string()).collect(),
    }
}
