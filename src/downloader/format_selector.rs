// FormatSelector - quality tiers to yt-dlp format expressions
//
// Handles:
// - Tier -> format selector (height ceiling, unbounded for `best`)
// - Audio-only selection
// - Which tiers a probed source actually offers

use super::extractors::ProbedFormat;
use super::models::QualityTier;

/// Format selector for audio-only downloads
pub const AUDIO_FORMAT_SPEC: &str = "bestaudio/best";

pub struct FormatSelector;

impl FormatSelector {
    /// yt-dlp format spec for a video download at `tier`
    pub fn format_spec(tier: QualityTier) -> String {
        match tier.height() {
            None => "bestvideo+bestaudio/best".to_string(),
            Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
        }
    }

    /// `best` followed by every tier whose exact height appears in `formats`,
    /// highest first
    pub fn available_qualities(formats: &[ProbedFormat]) -> Vec<String> {
        QualityTier::ALL
            .iter()
            .filter(|tier| match tier.height() {
                None => true,
                Some(h) => formats.iter().any(|f| f.height == Some(h)),
            })
            .map(|tier| tier.as_str().to_string())
            .collect()
    }
}
