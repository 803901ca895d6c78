use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::engine::Engine;
use crate::feed::FeedEvent;

/// Recomputes and publishes statistics every `every`. The first pass runs
/// one full interval after start; overrun ticks are skipped, never queued.
pub async fn run_stats_loop<C>(engine: Arc<Engine>, every: Duration, clock: C)
where
    C: Fn() -> u64 + Send + Sync,
{
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(every_s = every.as_secs(), "stats loop started");

    loop {
        ticker.tick().await;
        engine.tick(clock()).await;
    }
}

/// Feeds every event from the feed client into the engine, in order.
/// Returns when the sending side is dropped.
pub async fn run_ingest_loop<C>(engine: Arc<Engine>, mut events: Receiver<FeedEvent>, clock: C)
where
    C: Fn() -> u64 + Send + Sync,
{
    while let Some(event) = events.recv().await {
        engine.handle_feed_event(event, clock()).await;
    }
    tracing::info!("feed event channel closed; ingest loop exiting");
}
