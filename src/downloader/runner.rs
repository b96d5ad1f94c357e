// Download job runner
//
// Runs one download from option building to the optional trim. Progress goes
// out through an mpsc channel; cancellation comes in through a shared flag
// that is only looked at when the extractor reports a tick.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::errors::DownloadError;
use super::extractors::{AudioExtraction, FetchOptions, HookFlow, MediaExtractor, ProgressHook};
use super::format_selector::{FormatSelector, AUDIO_FORMAT_SPEC};
use super::models::{DownloadMode, DownloadRequest, AUDIO_QUALITY};
use super::progress::{ProgressEvent, ProgressTick, TickStatus};
use super::trim::{trim_in_place, MediaTranscoder};
use super::validate::ensure_supported_url;

/// Cooperative cancellation flag shared between the registry and a runner
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Output template relative to the requested directory
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Build the extractor option set for `request`
pub fn build_fetch_options(request: &DownloadRequest) -> FetchOptions {
    let output_template = request
        .output_dir
        .join(OUTPUT_TEMPLATE)
        .to_string_lossy()
        .to_string();

    match request.mode {
        DownloadMode::Audio => FetchOptions {
            url: request.url.clone(),
            format: AUDIO_FORMAT_SPEC.to_string(),
            output_template,
            merge_format: None,
            extract_audio: Some(AudioExtraction {
                codec: request.audio_format.clone(),
                quality: AUDIO_QUALITY.to_string(),
            }),
        },
        DownloadMode::Video => FetchOptions {
            url: request.url.clone(),
            format: FormatSelector::format_spec(request.quality),
            output_template,
            merge_format: Some(request.video_format.clone()),
            extract_audio: None,
        },
    }
}

/// Hook handed to the extractor for one job
struct JobHook {
    events: UnboundedSender<ProgressEvent>,
    cancel: CancelFlag,
    finished_file: Option<PathBuf>,
}

impl ProgressHook for JobHook {
    fn on_tick(&mut self, tick: &ProgressTick) -> HookFlow {
        if self.cancel.is_cancelled() {
            return HookFlow::Abort;
        }

        if tick.status == TickStatus::Finished {
            if let Some(name) = &tick.filename {
                self.finished_file = Some(PathBuf::from(name));
            }
        }

        if let Some(event) = ProgressEvent::from_tick(tick) {
            // The registry side may already be gone during shutdown
            let _ = self.events.send(event);
        }
        HookFlow::Continue
    }
}

/// Runs downloads against an extractor and a transcoder
#[derive(Clone)]
pub struct DownloadRunner {
    extractor: Arc<dyn MediaExtractor>,
    transcoder: Arc<dyn MediaTranscoder>,
}

impl DownloadRunner {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        transcoder: Arc<dyn MediaTranscoder>,
    ) -> Self {
        Self {
            extractor,
            transcoder,
        }
    }

    /// Download `request` and return the final output path.
    ///
    /// Fails with `Cancelled` when the flag was observed at a tick (or set by
    /// the time the extractor gave up), `ExtractionFailed` for yt-dlp errors
    /// and `TrimFailed`/`FileNotFound` for the trim step.
    pub async fn run(
        &self,
        request: &DownloadRequest,
        events: UnboundedSender<ProgressEvent>,
        cancel: CancelFlag,
    ) -> Result<PathBuf, DownloadError> {
        ensure_supported_url(&request.url)?;

        let options = build_fetch_options(request);
        tracing::info!(
            url = %request.url,
            mode = ?request.mode,
            quality = %request.quality,
            extractor = self.extractor.name(),
            "Starting download"
        );

        let mut hook = JobHook {
            events: events.clone(),
            cancel: cancel.clone(),
            finished_file: None,
        };

        let outcome = match self.extractor.fetch(&options, &mut hook).await {
            Ok(outcome) => outcome,
            Err(_) if cancel.is_cancelled() => return Err(DownloadError::Cancelled),
            Err(e) => return Err(e),
        };

        let output = outcome
            .output_path
            .or(hook.finished_file)
            .ok_or_else(|| {
                DownloadError::ExtractionFailed("yt-dlp did not report an output file".to_string())
            })?;

        if request.range.is_empty() {
            return Ok(output);
        }

        let _ = events.send(ProgressEvent::Processing {
            filename: Some(output.to_string_lossy().to_string()),
        });
        trim_in_place(self.transcoder.as_ref(), &output, request.range).await
    }
}
