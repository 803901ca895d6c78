use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::logger::{TickId, annotate_tick, tick_span, warn_if_slow};
use corelib::RawSpot;
use parking_lot::Mutex;
use tracing::Instrument;

use crate::aggregate::{StatsScope, WindowStats};
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::enrich::EnrichmentLookup;
use crate::entity::EntityId;
use crate::feed::FeedEvent;
use crate::filter::{FilterDecision, FilterEngine, MonitorMode};
use crate::health::HealthMonitor;
use crate::history::HistoryStore;
use crate::normalize::{NormalizeError, Normalizer, Perspective};
use crate::pairs::PairTable;
use crate::publish::{Publisher, SinkCommand};
use crate::sink::MetricSink;
use crate::spot::{Callsign, Spot};

const SLOW_SINK: Duration = Duration::from_secs(2);

/// Everything the arrival path and the periodic path both touch.
struct CoreState {
    history: HistoryStore,
    pairs: PairTable,
    publisher: Publisher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub spots_in_window: usize,
    pub commands: usize,
    pub sink_failures: u64,
    pub pairs_pruned: usize,
}

/// Spot statistics engine. One per process, shared by `Arc` between the
/// feed task and the periodic task.
pub struct Engine {
    config: EngineConfig,
    station: Option<Callsign>,
    scopes: Vec<StatsScope>,
    normalizer: Normalizer,
    filter: FilterEngine,
    catalog: Catalog,
    health: HealthMonitor,
    state: Mutex<CoreState>,
    sink: Arc<dyn MetricSink>,
    /// Last sink link epoch acted on.
    link_epoch: AtomicU64,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        enrichment: Arc<dyn EnrichmentLookup>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        let station = match &config.mode {
            MonitorMode::Detailed { callsign, .. } => Some(callsign.clone()),
            MonitorMode::Summary { .. } => None,
        };
        let perspective = station
            .clone()
            .map_or(Perspective::Path, Perspective::Station);

        Self {
            scopes: StatsScope::for_mode(&config.mode),
            normalizer: Normalizer::new(enrichment, perspective),
            filter: FilterEngine::new(config.mode.clone(), config.filter.clone()),
            catalog: Catalog::new(station.as_ref()),
            health: HealthMonitor::new(config.stale_after_ms, config.rate_window_ms),
            state: Mutex::new(CoreState {
                history: HistoryStore::new(config.window_ms, config.max_history),
                pairs: PairTable::new(),
                publisher: Publisher::new(),
            }),
            station,
            config,
            link_epoch: AtomicU64::new(sink.link_epoch()),
            sink,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Dispatches one event from the feed client.
    pub async fn handle_feed_event(&self, event: FeedEvent, now_ms: u64) {
        match event {
            FeedEvent::Message(text) => {
                // Already counted in health and logged by `ingest`; one bad
                // message never stops the feed.
                if let Err(e) = self.ingest_message(&text, now_ms).await {
                    tracing::trace!(error = %e, "feed message rejected");
                }
            }
            FeedEvent::Connected { topics } => {
                tracing::info!(topics = topics.len(), "feed connected");
                self.health.on_connected(now_ms, topics);
            }
            FeedEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "feed disconnected");
                self.health.on_disconnected(reason);
            }
        }
    }

    /// Decodes and ingests one raw feed message.
    pub async fn ingest_message(
        &self,
        text: &str,
        now_ms: u64,
    ) -> Result<FilterDecision, NormalizeError> {
        match RawSpot::from_json(text) {
            Ok(raw) => self.ingest(&raw, now_ms).await,
            Err(e) => {
                self.health.record_message(now_ms);
                self.health.record_parse_error();
                tracing::debug!(error = %e, "undecodable feed message");
                Err(NormalizeError::Undecodable(e.to_string()))
            }
        }
    }

    /// Arrival path: normalize, filter, record, and emit the pair sensor for
    /// retained spots.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn ingest(
        &self,
        raw: &RawSpot,
        now_ms: u64,
    ) -> Result<FilterDecision, NormalizeError> {
        self.health.record_message(now_ms);

        let normalized = match self.normalizer.normalize(raw, now_ms) {
            Ok(n) => n,
            Err(e) => {
                self.health.record_parse_error();
                tracing::debug!(error = %e, "dropping malformed spot");
                return Err(e);
            }
        };
        self.health.record_enrichment_misses(normalized.enrichment_misses);

        let spot = Arc::new(normalized.spot);
        self.health
            .record_spot(now_ms, spot.reported_at_ms, spot.sequence);

        let decision = self.filter.evaluate(&spot);
        let commands = match decision {
            FilterDecision::Dropped(reason) => {
                tracing::trace!(?reason, sender = %spot.sender, receiver = %spot.receiver, "spot dropped");
                return Ok(decision);
            }
            FilterDecision::CountedOnly(_) => {
                self.state.lock().history.append(spot);
                Vec::new()
            }
            FilterDecision::Retained => {
                let mut st = self.state.lock();
                st.history.append(Arc::clone(&spot));
                let observation = st.pairs.record(&spot);
                let update = self.catalog.observation(&observation);
                st.publisher.plan([update])
            }
        };

        self.execute(commands).await;
        Ok(decision)
    }

    /// Periodic path: housekeeping, recompute every scope from one snapshot,
    /// publish what changed.
    pub async fn tick(&self, now_ms: u64) -> TickReport {
        let tick_id = TickId::new();
        let span = tick_span(self.scopes.len(), &tick_id);
        self.tick_inner(now_ms).instrument(span).await
    }

    async fn tick_inner(&self, now_ms: u64) -> TickReport {
        let epoch = self.sink.link_epoch();
        if self.link_epoch.swap(epoch, Ordering::SeqCst) != epoch {
            tracing::info!(epoch, "sink link re-established");
            self.reannounce();
        }

        let (snapshot, pairs_pruned) = {
            let mut st = self.state.lock();
            let pruned = match self.config.pair_idle_ttl_ms {
                0 => 0,
                ttl => st.pairs.prune_idle(now_ms, ttl),
            };
            (st.history.snapshot(now_ms), pruned)
        };

        let mut updates = Vec::new();
        for stats in self.compute(&snapshot) {
            updates.extend(self.catalog.stats(&stats));
        }
        updates.extend(self.catalog.health(&self.health.snapshot(now_ms)));

        let commands = self.state.lock().publisher.plan(updates);
        annotate_tick(snapshot.len(), commands.len());

        let report = TickReport {
            spots_in_window: snapshot.len(),
            commands: commands.len(),
            sink_failures: self.execute(commands).await,
            pairs_pruned,
        };
        tracing::info!(
            spots = report.spots_in_window,
            commands = report.commands,
            sink_failures = report.sink_failures,
            pairs_pruned = report.pairs_pruned,
            "stats tick complete"
        );
        report
    }

    /// Aggregates for every scope over the current window, without
    /// publishing anything.
    pub fn window_stats(&self, now_ms: u64) -> Vec<WindowStats> {
        let snapshot = self.window(now_ms);
        self.compute(&snapshot)
    }

    pub fn window(&self, now_ms: u64) -> Vec<Arc<Spot>> {
        self.state.lock().history.snapshot(now_ms)
    }

    pub fn tracked_pairs(&self) -> usize {
        self.state.lock().pairs.len()
    }

    /// Forces every entity to be registered again on its next emission.
    pub fn reannounce(&self) {
        let mut st = self.state.lock();
        tracing::info!(entities = st.publisher.len(), "re-announcing entities");
        st.publisher.reannounce();
    }

    fn compute(&self, snapshot: &[Arc<Spot>]) -> Vec<WindowStats> {
        self.scopes
            .iter()
            .map(|scope| {
                WindowStats::compute(snapshot, *scope, self.station.as_ref(), self.config.window_ms)
            })
            .collect()
    }

    /// Sends commands in order. Failures roll the publication cache back so
    /// the next pass retries; a failed register skips that entity's publish.
    async fn execute(&self, commands: Vec<SinkCommand>) -> u64 {
        if commands.is_empty() {
            return 0;
        }
        let failures = warn_if_slow("sink_io", SLOW_SINK, async {
            let mut failures = 0u64;
            let mut unregistered: HashSet<EntityId> = HashSet::new();

            for cmd in &commands {
                let result = match cmd {
                    SinkCommand::Register { id, shape } => self.sink.register(id, shape).await,
                    SinkCommand::Publish { id, .. } if unregistered.contains(id) => continue,
                    SinkCommand::Publish { id, payload } => self.sink.publish(id, payload).await,
                };
                if let Err(e) = result {
                    failures += 1;
                    tracing::warn!(entity = %cmd.id(), error = %e, "sink command failed");
                    if let SinkCommand::Register { id, .. } = cmd {
                        unregistered.insert(id.clone());
                    }
                    self.state.lock().publisher.rollback(cmd);
                }
            }
            failures
        })
        .await;

        self.health.record_sink_failures(failures);
        failures
    }
}
