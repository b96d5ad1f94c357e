use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn binary_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locates yt-dlp and ffmpeg.
///
/// Lookup order: explicit override, next to the running executable (bundled
/// layout), common install prefixes, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    ytdlp_override: Option<PathBuf>,
    ffmpeg_override: Option<PathBuf>,
}

impl ToolManager {
    pub fn new(ytdlp_override: Option<PathBuf>, ffmpeg_override: Option<PathBuf>) -> Self {
        Self {
            ytdlp_override,
            ffmpeg_override,
        }
    }

    /// Path to run for `tool`. Falls back to the bare binary name so the
    /// spawn error names what is missing.
    pub fn resolve(&self, tool: ToolType) -> PathBuf {
        self.locate(tool)
            .unwrap_or_else(|| PathBuf::from(tool.binary_name()))
    }

    /// Path of `tool` if it can be found anywhere
    pub fn locate(&self, tool: ToolType) -> Option<PathBuf> {
        let explicit = match tool {
            ToolType::YtDlp => self.ytdlp_override.as_ref(),
            ToolType::Ffmpeg => self.ffmpeg_override.as_ref(),
        };
        if let Some(path) = explicit {
            // Accept either the binary itself or its directory
            let candidate = if path.is_dir() {
                path.join(tool.binary_name())
            } else {
                path.clone()
            };
            if candidate.exists() {
                return Some(candidate);
            }
            tracing::warn!(
                tool = tool.as_str(),
                path = %path.display(),
                "Configured tool path does not exist"
            );
        }

        Self::candidate_paths(tool)
            .into_iter()
            .find(|p| p.is_file())
            .or_else(|| Self::which(tool))
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path.as_deref().and_then(|p| Self::get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path: path.map(|p| p.to_string_lossy().to_string()),
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    fn candidate_paths(tool: ToolType) -> Vec<PathBuf> {
        let binary = tool.binary_name();
        let mut dirs_to_check: Vec<PathBuf> = Vec::new();

        // Bundled layout: tool directory beside the executable or up to two
        // levels above it (resources/ffmpeg)
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            dirs_to_check.push(exe_dir.clone());
            dirs_to_check.push(exe_dir.join(tool.as_str()));
            dirs_to_check.push(exe_dir.join("..").join(tool.as_str()));
            dirs_to_check.push(exe_dir.join("..").join("..").join(tool.as_str()));
        }

        if let Some(home) = dirs::home_dir() {
            dirs_to_check.push(home.join(".local").join("bin"));
        }
        dirs_to_check.push(PathBuf::from("/opt/homebrew/bin")); // Homebrew on Apple Silicon
        dirs_to_check.push(PathBuf::from("/usr/local/bin")); // Homebrew on Intel Mac
        dirs_to_check.push(PathBuf::from("/usr/bin"));

        dirs_to_check.into_iter().map(|d| d.join(&binary)).collect()
    }

    fn which(tool: ToolType) -> Option<PathBuf> {
        let finder = if cfg!(windows) { "where" } else { "which" };
        let output = Command::new(finder).arg(tool.as_str()).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    fn get_version(path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                let out = String::from_utf8_lossy(&output.stdout);
                // ffmpeg prints a banner; the first line carries the version
                out.lines().next().map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}
