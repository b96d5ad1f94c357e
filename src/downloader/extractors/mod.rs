// Extraction engine abstraction
//
// `MediaExtractor` is the seam between the job runner and yt-dlp:
// - `CliExtractor` drives the native `yt-dlp` binary
// - tests substitute a scripted fake
//
// `diagnostics` turns raw yt-dlp stderr into a short, actionable reason.

mod cli;
mod diagnostics;
mod traits;

pub use cli::CliExtractor;
pub use diagnostics::{diagnose_error, FailureReason};
pub use traits::{
    AudioExtraction, FetchOptions, FetchOutcome, HookFlow, MediaExtractor, MediaProbe,
    ProbedFormat, ProgressHook,
};
