use clap::Parser;
use tracing_subscriber::EnvFilter;

use youtube_helper_lib::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    youtube_helper_lib::run(config).await
}
