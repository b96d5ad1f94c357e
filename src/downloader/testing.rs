// Scripted engines for unit tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::errors::DownloadError;
use super::extractors::{
    FetchOptions, FetchOutcome, HookFlow, MediaExtractor, MediaProbe, ProgressHook,
};
use super::models::TimeRange;
use super::progress::ProgressTick;
use super::trim::MediaTranscoder;

pub(crate) const FAKE_TITLE: &str = "Fake Title";

/// Extractor that replays a fixed list of ticks and writes a file named
/// after `FAKE_TITLE` into the requested output directory.
pub(crate) struct FakeExtractor {
    probe: Result<MediaProbe, DownloadError>,
    probe_calls: AtomicUsize,
    ticks: Vec<ProgressTick>,
    report_output: bool,
    failure: Option<DownloadError>,
    gate: Option<Arc<Semaphore>>,
    fetches: Mutex<Vec<FetchOptions>>,
}

impl FakeExtractor {
    pub fn with_probe(probe: Result<MediaProbe, DownloadError>) -> Self {
        Self {
            probe,
            probe_calls: AtomicUsize::new(0),
            ticks: Vec::new(),
            report_output: true,
            failure: None,
            gate: None,
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn downloading(ticks: Vec<ProgressTick>) -> Self {
        Self {
            ticks,
            ..Self::with_probe(Ok(MediaProbe::default()))
        }
    }

    /// Leave the output path to the finished tick
    pub fn without_output_report(mut self) -> Self {
        self.report_output = false;
        self
    }

    pub fn failing_with(mut self, error: DownloadError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Hold every tick after the first until a permit is added
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn percent_tick(percent: &str) -> ProgressTick {
        ProgressTick {
            percent_str: Some(percent.to_string()),
            speed_str: Some("1.00MiB/s".to_string()),
            eta_str: Some("00:05".to_string()),
            ..ProgressTick::downloading()
        }
    }

    pub fn bytes_tick(downloaded: f64, total: f64) -> ProgressTick {
        ProgressTick {
            downloaded_bytes: Some(downloaded),
            total_bytes: Some(total),
            ..ProgressTick::downloading()
        }
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> Vec<FetchOptions> {
        self.fetches.lock().unwrap().clone()
    }

    fn target_path(options: &FetchOptions) -> PathBuf {
        let ext = options
            .extract_audio
            .as_ref()
            .map(|a| a.codec.as_str())
            .or(options.merge_format.as_deref())
            .unwrap_or("mp4");
        PathBuf::from(
            options
                .output_template
                .replace("%(title)s", FAKE_TITLE)
                .replace("%(ext)s", ext),
        )
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn probe(&self, _url: &str) -> Result<MediaProbe, DownloadError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe.clone()
    }

    async fn fetch(
        &self,
        options: &FetchOptions,
        hook: &mut dyn ProgressHook,
    ) -> Result<FetchOutcome, DownloadError> {
        self.fetches.lock().unwrap().push(options.clone());

        for (i, tick) in self.ticks.iter().enumerate() {
            if i > 0 {
                if let Some(gate) = &self.gate {
                    gate.acquire()
                        .await
                        .map_err(|_| DownloadError::ExtractionFailed("gate closed".to_string()))?
                        .forget();
                }
            }
            if hook.on_tick(tick) == HookFlow::Abort {
                return Err(DownloadError::Cancelled);
            }
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let target = Self::target_path(options);
        std::fs::write(&target, b"downloaded")?;

        let finished = ProgressTick::finished(target.to_string_lossy());
        if hook.on_tick(&finished) == HookFlow::Abort {
            return Err(DownloadError::Cancelled);
        }

        Ok(FetchOutcome {
            output_path: self.report_output.then_some(target),
        })
    }
}

/// Transcoder that writes canned bytes instead of running ffmpeg
pub(crate) struct FakeTranscoder {
    bytes: &'static [u8],
    fail: bool,
}

impl FakeTranscoder {
    pub fn writing(bytes: &'static [u8]) -> Self {
        Self { bytes, fail: false }
    }

    pub fn failing_after_partial_write() -> Self {
        Self {
            bytes: b"partial",
            fail: true,
        }
    }
}

#[async_trait]
impl MediaTranscoder for FakeTranscoder {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn stream_copy(
        &self,
        _input: &Path,
        _range: TimeRange,
        output: &Path,
    ) -> Result<(), DownloadError> {
        std::fs::write(output, self.bytes)?;
        if self.fail {
            return Err(DownloadError::TrimFailed("ffmpeg exited with 1".to_string()));
        }
        Ok(())
    }
}
