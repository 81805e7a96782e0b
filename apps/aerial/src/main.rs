use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracker_core::{bootstrap, HttpFeed, Startup};

mod config;
mod sink;

use config::load_settings;
use sink::ConsoleSink;

#[derive(Parser, Debug)]
#[command(about = "Follows transit vehicles from the live stop feed")]
struct Args {
    /// Base url of the feed server, overriding config and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    transition_ms: Option<u64>,
    /// Use the double-resolution icon set.
    #[arg(long)]
    retina: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(transition_ms) = args.transition_ms {
        settings.transition_ms = transition_ms;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(server_url = %settings.server_url, "aerial: starting");
    let feed = HttpFeed::new(&settings.server_url, settings.feed_paths())?;
    let Startup {
        mut processor,
        events,
        snapshot,
        ..
    } = bootstrap(
        &feed,
        ConsoleSink::new(args.retina),
        settings.tracker_config(),
    )
    .await?;

    if snapshot.malformed > 0 {
        warn!(skipped = snapshot.malformed, "snapshot: some records were unreadable");
    }

    let summary = tokio::select! {
        summary = processor.run(events) => summary,
        _ = tokio::signal::ctrl_c() => {
            info!("aerial: interrupted");
            return Ok(());
        }
    };

    match &summary.failure {
        Some(failure) => warn!(%failure, "stream: ended on transport error"),
        None => info!("stream: closed by server"),
    }
    info!(
        received = summary.received,
        applied = summary.applied,
        dropped = summary.dropped,
        tracked = processor.registry().len(),
        markers = processor.sink().marker_count(),
        "aerial: done"
    );
    Ok(())
}
