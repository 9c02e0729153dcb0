use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_curator::{
    config::Config,
    probe::{FfprobeProber, ProbeCache},
    repositories::MemoryChannelStore,
    services::{Curator, EnrichmentOptions, HttpFetcher},
};

#[derive(Parser)]
#[command(name = "m3u-curator")]
#[command(version = "0.1.0")]
#[command(about = "Reformats huge IPTV channel playlists")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Force re-probing of channel stream dimensions
    #[arg(short, long)]
    force: bool,

    /// Never probe channels the store already knows, even without metadata
    #[arg(long)]
    no_probe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("m3u_curator={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting M3U curator v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load(&cli.config)?);
    info!(
        "Configuration loaded from {}: {} playlists, {} group rules",
        cli.config,
        config.playlists.len(),
        config.groups.len()
    );

    let cache = Arc::new(ProbeCache::new(Duration::from_secs(
        config.probe.wait_timeout_secs,
    )));
    let prober = Arc::new(FfprobeProber::new(
        config.probe.ffprobe.clone(),
        Duration::from_secs(config.probe.timeout_secs),
    ));
    let store = Arc::new(MemoryChannelStore::new());
    let fetcher = Arc::new(HttpFetcher::new()?);

    let curator = Arc::new(Curator::new(
        Arc::clone(&config),
        store,
        prober,
        fetcher,
        cache,
        EnrichmentOptions {
            concurrency: config.probe.concurrency,
            force_reload: cli.force,
            no_probe: cli.no_probe,
        },
    ));

    // One independent task per playlist; tasks share only the probe cache
    // and the channel store.
    let mut tasks = JoinSet::new();
    for list in config.playlists.clone() {
        let curator = Arc::clone(&curator);
        tasks.spawn(async move {
            if let Err(err) = curator.process_playlist(&list).await {
                error!("playlist {} failed: {err:#}", list.url);
            }
        });
    }
    while tasks.join_next().await.is_some() {}

    info!("All playlists processed");
    Ok(())
}
