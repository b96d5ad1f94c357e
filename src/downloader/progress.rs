// Progress ticks from yt-dlp and their normalized form
//
// yt-dlp is asked to print every progress tick through a machine-readable
// `--progress-template`; the final file path (after merge/post-processing)
// arrives through `--print after_move:`. Both line formats are defined here
// so the argument builder and the parser cannot drift apart.

use std::path::PathBuf;

use regex::Regex;

use super::models::{JobStatus, ProgressRecord};

const TICK_MARKER: &str = "[yth-progress]";
const FILE_MARKER: &str = "[yth-file]";
const FIELD_SEP: char = '|';

/// Value for `--progress-template`. The filename goes last because it may
/// itself contain the separator.
pub fn progress_template() -> String {
    format!(
        "download:{TICK_MARKER}%(progress.status)s|%(progress.downloaded_bytes)s|\
         %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|\
         %(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s|\
         %(progress.filename)s"
    )
}

/// Value for `--print` reporting the final output path
pub fn output_path_template() -> String {
    format!("after_move:{FILE_MARKER}%(filepath)s")
}

lazy_static::lazy_static! {
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Downloading,
    Finished,
    Other,
}

/// One raw progress event
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressTick {
    pub status: TickStatus,
    pub downloaded_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    pub total_bytes_estimate: Option<f64>,
    pub percent_str: Option<String>,
    pub speed_str: Option<String>,
    pub eta_str: Option<String>,
    pub filename: Option<String>,
}

impl ProgressTick {
    pub fn downloading() -> Self {
        Self {
            status: TickStatus::Downloading,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            percent_str: None,
            speed_str: None,
            eta_str: None,
            filename: None,
        }
    }

    pub fn finished(filename: impl Into<String>) -> Self {
        Self {
            status: TickStatus::Finished,
            filename: Some(filename.into()),
            ..Self::downloading()
        }
    }

    /// Percentage in [0, 100].
    ///
    /// A reported percent string wins, even when it does not parse (yields
    /// 0). Otherwise downloaded/total, then downloaded/estimate, then 0.
    pub fn percent(&self) -> f32 {
        let value = if let Some(raw) = &self.percent_str {
            parse_percent(raw).unwrap_or(0.0)
        } else {
            match (self.downloaded_bytes, self.total_bytes, self.total_bytes_estimate) {
                (Some(done), Some(total), _) if total > 0.0 => done / total * 100.0,
                (Some(done), _, Some(estimate)) if estimate > 0.0 => done / estimate * 100.0,
                _ => 0.0,
            }
        };
        (value as f32).clamp(0.0, 100.0)
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned = strip_ansi(raw);
    cleaned
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

/// yt-dlp prints `NA` for fields it does not know
fn field(raw: &str) -> Option<String> {
    let cleaned = strip_ansi(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "NA" || trimmed == "None" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn number(raw: &str) -> Option<f64> {
    field(raw).and_then(|v| v.parse::<f64>().ok())
}

/// Parse a line produced by `progress_template()`
pub fn parse_progress_line(line: &str) -> Option<ProgressTick> {
    let (_, rest) = line.split_once(TICK_MARKER)?;
    let parts: Vec<&str> = rest.splitn(8, FIELD_SEP).collect();
    if parts.len() != 8 {
        return None;
    }

    let status = match parts[0].trim() {
        "downloading" => TickStatus::Downloading,
        "finished" => TickStatus::Finished,
        _ => TickStatus::Other,
    };

    Some(ProgressTick {
        status,
        downloaded_bytes: number(parts[1]),
        total_bytes: number(parts[2]),
        total_bytes_estimate: number(parts[3]),
        percent_str: field(parts[4]),
        speed_str: field(parts[5]),
        eta_str: field(parts[6]),
        filename: field(parts[7]),
    })
}

/// Parse a line produced by `output_path_template()`
pub fn parse_output_line(line: &str) -> Option<PathBuf> {
    let (_, rest) = line.split_once(FILE_MARKER)?;
    let path = rest.trim();
    (!path.is_empty() && path != "NA").then(|| PathBuf::from(path))
}

/// Normalized event sent from a runner to the registry
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        progress: f32,
        speed: Option<String>,
        eta: Option<String>,
        filename: Option<String>,
    },
    Processing {
        filename: Option<String>,
    },
}

impl ProgressEvent {
    pub fn from_tick(tick: &ProgressTick) -> Option<Self> {
        match tick.status {
            TickStatus::Downloading => Some(Self::Downloading {
                progress: tick.percent(),
                speed: tick.speed_str.clone(),
                eta: tick.eta_str.clone(),
                filename: tick.filename.clone(),
            }),
            TickStatus::Finished => Some(Self::Processing {
                filename: tick.filename.clone(),
            }),
            TickStatus::Other => None,
        }
    }

    /// Fold this event into the job's record
    pub fn apply(&self, record: &mut ProgressRecord) {
        match self {
            Self::Downloading {
                progress,
                speed,
                eta,
                filename,
            } => {
                record.status = JobStatus::Downloading;
                record.progress = *progress;
                record.speed = speed.clone();
                record.eta = eta.clone();
                if filename.is_some() {
                    record.filename = filename.clone();
                }
            }
            Self::Processing { filename } => {
                record.status = JobStatus::Processing;
                record.progress = 100.0;
                if filename.is_some() {
                    record.filename = filename.clone();
                }
            }
        }
    }
}
