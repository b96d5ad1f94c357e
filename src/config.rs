// Command-line and environment configuration

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Local YouTube download backend", long_about = None)]
pub struct Config {
    /// Address to bind the HTTP server to
    #[arg(long, env = "YTH_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(long, env = "YTH_PORT", default_value_t = 5000)]
    pub port: u16,

    /// yt-dlp binary, or the directory containing it
    #[arg(long = "yt-dlp", env = "YTDLP_PATH")]
    pub ytdlp_path: Option<PathBuf>,

    /// ffmpeg binary, or the directory containing it
    #[arg(long = "ffmpeg", env = "FFMPEG_PATH")]
    pub ffmpeg_path: Option<PathBuf>,

    /// Seconds allowed for a metadata probe
    #[arg(long, env = "YTH_PROBE_TIMEOUT", default_value_t = 30)]
    pub probe_timeout: u64,
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
