pub mod config;
pub mod downloader;
pub mod server;

use config::Config;
use downloader::{ToolManager, ToolType};

/// Log which external tools are usable before accepting requests
fn log_tool_status(config: &Config) {
    let tools = ToolManager::new(config.ytdlp_path.clone(), config.ffmpeg_path.clone());
    for info in tools.get_all_tools() {
        match (&info.path, &info.version) {
            (Some(path), version) => tracing::info!(
                tool = %info.name,
                path = %path,
                version = version.as_deref().unwrap_or("unknown"),
                "Tool available"
            ),
            (None, _) if info.tool_type == ToolType::YtDlp => {
                tracing::error!("yt-dlp not found; downloads will fail until it is installed")
            }
            (None, _) => tracing::warn!("ffmpeg not found; merging and trimming will fail"),
        }
    }
}

/// Run the HTTP backend until shutdown
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("youtube-helper v{}", env!("CARGO_PKG_VERSION"));
    log_tool_status(&config);
    server::serve(&config).await
}
