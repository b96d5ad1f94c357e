// Failure diagnostics - classifies yt-dlp error output
//
// Only used to make ExtractionFailed messages actionable; failed jobs are
// never retried based on the diagnosis.

use serde::{Deserialize, Serialize};

/// Known reasons an extraction fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Private video requiring authorization
    PrivateVideo,
    /// Deleted, removed or otherwise unavailable
    VideoUnavailable,
    /// Age gate requiring a logged-in account
    AgeRestricted,
    /// Geographic restriction
    GeoBlocked,
    /// DRM or paid content
    DrmProtected,
    /// HTTP 429 or similar throttling
    RateLimited,
    /// HTTP 403 Forbidden
    Forbidden,
    /// Connection-level failure
    NetworkError,
    /// Nothing recognizable
    Unknown,
}

impl FailureReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Not available in your country",
            Self::DrmProtected => "DRM-protected content",
            Self::RateLimited => "Rate limited by YouTube",
            Self::Forbidden => "Access denied (HTTP 403)",
            Self::NetworkError => "Network error",
            Self::Unknown => "Unknown error",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Analyze yt-dlp stderr and return the failure reason.
/// Returns `None` for empty output.
pub fn diagnose_error(error: &str) -> Option<FailureReason> {
    if error.trim().is_empty() {
        return None;
    }

    let lower = error.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    // Order matters: more specific patterns first
    if has(&["drm", "widevine", "requires purchase", "rental", "this video requires payment"]) {
        return Some(FailureReason::DrmProtected);
    }
    if has(&["private video", "video is private", "sign in if you've been granted access"]) {
        return Some(FailureReason::PrivateVideo);
    }
    if has(&["age-restricted", "sign in to confirm your age"]) {
        return Some(FailureReason::AgeRestricted);
    }
    // yt-dlp prefixes geo blocks with "Video unavailable"
    if has(&[
        "available in your country",
        "blocked in your country",
        "geo restriction",
        "geographic restriction",
    ]) {
        return Some(FailureReason::GeoBlocked);
    }
    if has(&[
        "video unavailable",
        "video has been removed",
        "no longer available",
        "video is unavailable",
    ]) {
        return Some(FailureReason::VideoUnavailable);
    }
    if has(&["429", "too many requests", "rate limit"]) {
        return Some(FailureReason::RateLimited);
    }
    if has(&["403", "forbidden"]) {
        return Some(FailureReason::Forbidden);
    }
    if has(&[
        "timed out",
        "timeout",
        "connection refused",
        "network is unreachable",
        "name or service not known",
        "getaddrinfo failed",
    ]) {
        return Some(FailureReason::NetworkError);
    }

    Some(FailureReason::Unknown)
}
