mod init;
mod tick_id;

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

pub use init::init_tracing;
pub use tick_id::TickId;

/// Span covering one periodic recompute pass.
pub fn tick_span(scope_count: usize, tick_id: &TickId) -> Span {
    tracing::info_span!(
        "stats_tick",
        tick_id = %tick_id,
        scopes = scope_count,
        spots = field::Empty,
        commands = field::Empty
    )
}

/// Span for a long-lived spawned task (feed worker, ingest loop, ticker).
pub fn task_span(name: &'static str) -> Span {
    tracing::info_span!("task", name = %name)
}

/// Records the snapshot size and the number of sink commands on the current
/// tick span.
pub fn annotate_tick(spots: usize, commands: usize) {
    let span = Span::current();
    span.record("spots", spots);
    span.record("commands", commands);
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
