//! Turns an [`AppConfig`] into the concrete collaborators the engine runs with.

use std::sync::Arc;

use anyhow::Context;

use adapters::enrichment::{HamEnrichment, PrefixTable};
use adapters::feed::{WsSpotFeed, subscription_topics};
use adapters::sink::{DiscoveryConfig, DiscoverySink, HttpTransport, LogTransport};
use engine::enrich::EnrichmentLookup;
use engine::sink::MetricSink;

use crate::config::{AppConfig, SinkKind};

pub fn build_enrichment(cfg: &AppConfig) -> anyhow::Result<Arc<dyn EnrichmentLookup>> {
    let table = match &cfg.prefix_table_path {
        Some(path) => PrefixTable::load(path)
            .with_context(|| format!("loading prefix table from {}", path.display()))?,
        None => PrefixTable::builtin().context("parsing built-in prefix table")?,
    };
    tracing::info!(prefixes = table.len(), "callsign prefix table loaded");
    Ok(Arc::new(HamEnrichment::new(table)))
}

pub fn discovery_config(cfg: &AppConfig) -> DiscoveryConfig {
    DiscoveryConfig {
        discovery_prefix: cfg.discovery_prefix.clone(),
        entity_base: cfg.entity_base.clone(),
        station: cfg
            .callsign()
            .map_or_else(|| "global".to_string(), |c| c.to_string()),
    }
}

pub fn build_sink(cfg: &AppConfig) -> anyhow::Result<Arc<dyn MetricSink>> {
    let discovery = discovery_config(cfg);
    let sink: Arc<dyn MetricSink> = match cfg.sink {
        SinkKind::Log => Arc::new(DiscoverySink::new(discovery, LogTransport)),
        SinkKind::Http => {
            let url = cfg
                .sink_url
                .clone()
                .context("SINK_URL is required for the http sink")?;
            let transport = HttpTransport::new(url).context("building http transport")?;
            Arc::new(DiscoverySink::new(discovery, transport))
        }
    };
    Ok(sink)
}

pub fn build_feed(cfg: &AppConfig) -> WsSpotFeed {
    let topics = subscription_topics(&cfg.engine.mode, &cfg.modes, &cfg.bands);
    WsSpotFeed::new(cfg.feed_url.clone(), topics)
}
