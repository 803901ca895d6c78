use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::Instrument;

use bridge::config::AppConfig;
use bridge::wiring::{build_enrichment, build_feed, build_sink};
use common::logger::{init_tracing, task_span};
use common::time::now_ms;
use engine::Engine;
use engine::feed::{FeedEvent, SpotFeed};
use engine::runtime::{run_ingest_loop, run_stats_loop};

/// Bounded so a stalled engine applies backpressure to the feed reader.
const FEED_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    init_tracing("pskr-bridge", cfg.production);

    tracing::info!(
        station = cfg.callsign().map(|c| c.as_str()).unwrap_or("global"),
        window_s = cfg.engine.window_ms / 1000,
        every_s = cfg.stats_every.as_secs(),
        feed = %cfg.feed_url,
        "starting spot statistics bridge"
    );

    let enrichment = build_enrichment(&cfg)?;
    let sink = build_sink(&cfg)?;
    let engine = Arc::new(Engine::new(cfg.engine.clone(), enrichment, sink));

    let (events_tx, events_rx) = mpsc::channel::<FeedEvent>(FEED_QUEUE_CAPACITY);

    let feed = build_feed(&cfg);
    tokio::spawn(
        async move {
            if let Err(e) = feed.run(events_tx).await {
                tracing::error!(error = %e, "feed worker stopped");
            }
        }
        .instrument(task_span("feed")),
    );

    tokio::spawn(
        run_ingest_loop(Arc::clone(&engine), events_rx, now_ms).instrument(task_span("ingest")),
    );

    tokio::spawn(
        run_stats_loop(Arc::clone(&engine), cfg.stats_every, now_ms)
            .instrument(task_span("stats")),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        pairs = engine.tracked_pairs(),
        "shutdown signal received"
    );

    Ok(())
}
