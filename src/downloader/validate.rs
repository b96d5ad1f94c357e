// URL validation - accepted YouTube URL shapes

use regex::Regex;

use super::errors::DownloadError;

lazy_static::lazy_static! {
    static ref URL_PATTERNS: [Regex; 3] = [
        // watch page
        Regex::new(r"^(https?://)?(www\.)?youtube\.com/watch\?v=[\w-]+").unwrap(),
        // short link
        Regex::new(r"^(https?://)?(www\.)?youtu\.be/[\w-]+").unwrap(),
        // shorts
        Regex::new(r"^(https?://)?(www\.)?youtube\.com/shorts/[\w-]+").unwrap(),
    ];
}

/// Check whether `url` is a watch-page, short-link or shorts URL.
pub fn is_supported_url(url: &str) -> bool {
    URL_PATTERNS.iter().any(|re| re.is_match(url))
}

pub fn ensure_supported_url(url: &str) -> Result<(), DownloadError> {
    if is_supported_url(url) {
        Ok(())
    } else {
        Err(DownloadError::InvalidInput(format!("Invalid YouTube URL: {}", url)))
    }
}
