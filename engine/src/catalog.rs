//! Naming and shaping of every published entity.
//!
//! Ids are `stats/{scope}/{station}[/{band}][/{mode}]/{metric}`,
//! `health/{station}/{metric}` and `spots/{sender}/{receiver}`.

use common::time::iso_utc;
use serde_json::{Map, Value, json};

use crate::aggregate::{Activity, Spread, StatsScope, WindowStats};
use crate::entity::{DeviceGroup, EntityId, EntityShape, EntityUpdate, Emission, MetricValue, Payload};
use crate::health::HealthSnapshot;
use crate::pairs::PairObservation;
use crate::spot::Callsign;

const NONE: &str = "none";

#[derive(Debug, Clone)]
pub struct Catalog {
    station: String,
}

impl Catalog {
    /// `station` is the monitored callsign; summary mode has none.
    pub fn new(station: Option<&Callsign>) -> Self {
        Self {
            station: station
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "global".to_string()),
        }
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn stats(&self, stats: &WindowStats) -> Vec<EntityUpdate> {
        let mut b = StatsBuilder {
            station: &self.station,
            scope: stats.scope,
            out: Vec::new(),
        };
        let g = &stats.global;

        b.count(&[], "total_spots", "Total Spots", "spots", g.total_spots);
        b.count(
            &[],
            "total_unique_stations",
            "Unique Stations",
            "stations",
            g.unique_stations as u64,
        );
        b.count(
            &[],
            "total_unique_countries",
            "Unique Countries",
            "countries",
            g.unique_regions as u64,
        );
        b.spread("dist", "Distance", "km", "mdi:map-marker-distance", g.distance_km);
        b.spread("snr", "SNR", "dB", "mdi:signal", g.snr);
        b.count(&[], "active_bands", "Active Bands", "bands", g.active_bands as u64);
        b.push(
            &[],
            "spots_per_minute",
            "Spots per Minute".to_string(),
            EntityShape::sensor("", DeviceGroup::Stats(stats.scope))
                .unit("spots/min")
                .icon("mdi:speedometer")
                .measurement(),
            Payload::value(MetricValue::rounded(g.spots_per_minute)),
        );
        b.push(
            &[],
            "last_spot",
            "Last Spot".to_string(),
            EntityShape::sensor("", DeviceGroup::Stats(stats.scope)).icon("mdi:clock-outline"),
            Payload::value(MetricValue::Text(
                g.last_spot_ms
                    .and_then(iso_utc)
                    .unwrap_or_else(|| NONE.to_string()),
            )),
        );

        let band_counts: Map<String, Value> = stats
            .bands
            .iter()
            .map(|(band, s)| (band.to_string(), json!(s.count)))
            .collect();
        b.activity("most_active_band", "Most Active Band", &stats.most_active_band, "band_counts", band_counts);

        let mode_counts: Map<String, Value> = stats
            .modes
            .iter()
            .map(|(mode, s)| (mode.to_string(), json!(s.count)))
            .collect();
        b.activity("most_active_mode", "Most Active Mode", &stats.most_active_mode, "mode_counts", mode_counts);

        for (band, s) in &stats.bands {
            let key = [band.as_str()];
            b.count(&key, "count", &format!("{band} Spots"), "spots", s.count);
            b.count(
                &key,
                "unique_countries",
                &format!("{band} Unique Countries"),
                "countries",
                s.unique_regions as u64,
            );
        }

        for (mode, s) in &stats.modes {
            let key = [mode.as_str()];
            b.count(&key, "count", &format!("{mode} Spots"), "spots", s.count);
            b.count(
                &key,
                "unique_stations",
                &format!("{mode} Unique Stations"),
                "stations",
                s.unique_stations as u64,
            );
        }

        for ((band, mode), s) in &stats.groups {
            let key = [band.as_str(), mode.as_str()];
            let label = format!("{band} {mode}");
            b.count(&key, "count", &format!("{label} Spots"), "spots", s.count);
            b.count(
                &key,
                "unique_stations",
                &format!("{label} Unique Stations"),
                "stations",
                s.unique_stations as u64,
            );
            b.measure(
                &key,
                "avg_dist",
                format!("{label} Avg Distance"),
                "km",
                "mdi:map-marker-distance",
                s.avg_distance_km.unwrap_or(0.0),
            );
            b.measure(&key, "avg_snr", format!("{label} Avg SNR"), "dB", "mdi:signal", s.avg_snr);
        }

        b.out
    }

    pub fn health(&self, h: &HealthSnapshot) -> Vec<EntityUpdate> {
        let mut out = Vec::new();
        let mut push = |metric: &str, shape: EntityShape, payload: Payload| {
            out.push(EntityUpdate {
                id: EntityId::new(["health", self.station.as_str(), metric]),
                shape,
                payload,
                emission: Emission::OnChange,
            });
        };

        push(
            "feed_health",
            EntityShape::binary_sensor("Feed Health", DeviceGroup::Health)
                .device_class("connectivity")
                .icon("mdi:heart-pulse")
                .with_attributes(),
            Payload::value(MetricValue::Bool(h.healthy))
                .attr("reason", h.reason.clone())
                .attr("connected", h.connected)
                .attr_opt("last_message_seconds_ago", h.last_record_age_ms.map(|ms| ms / 1000))
                .attr("messages_last_minute", h.messages_in_rate_window)
                .attr("total_messages", h.total_messages)
                .attr("healthy_threshold_seconds", h.stale_after_ms / 1000),
        );

        push(
            "message_rate",
            EntityShape::sensor("Message Rate", DeviceGroup::Health)
                .unit("msg/min")
                .icon("mdi:speedometer")
                .measurement()
                .with_attributes(),
            Payload::value(MetricValue::rounded(h.messages_per_minute))
                .attr("total_messages", h.total_messages),
        );

        push(
            "feed_latency",
            EntityShape::sensor("Feed Latency", DeviceGroup::Health)
                .unit("s")
                .icon("mdi:timer-outline")
                .measurement(),
            Payload::value(MetricValue::rounded(
                h.feed_latency_ms.unwrap_or(0) as f64 / 1000.0,
            )),
        );

        push(
            "connection_uptime",
            EntityShape::sensor("Connection Uptime", DeviceGroup::Health)
                .unit("s")
                .icon("mdi:timer-sand")
                .device_class("duration"),
            Payload::value(MetricValue::Int(
                (h.connection_uptime_ms.unwrap_or(0) / 1000) as i64,
            )),
        );

        push(
            "reconnect_count",
            EntityShape::sensor("Reconnects", DeviceGroup::Health)
                .icon("mdi:restart")
                .total_increasing()
                .with_attributes(),
            Payload::value(MetricValue::Int(h.reconnects as i64))
                .attr_opt("last_disconnect_reason", h.last_disconnect_reason.clone()),
        );

        push(
            "sequence_gaps",
            EntityShape::sensor("Sequence Gaps", DeviceGroup::Health)
                .icon("mdi:format-list-numbered")
                .total_increasing()
                .with_attributes(),
            Payload::value(MetricValue::Int(h.sequence_gaps as i64))
                .attr("total_gap_size", h.total_gap_size)
                .attr("out_of_order", h.out_of_order),
        );

        for (metric, name, value) in [
            ("parse_errors", "Parse Errors", h.parse_errors),
            ("enrichment_failures", "Enrichment Failures", h.enrichment_failures),
            ("sink_failures", "Publish Failures", h.sink_failures),
        ] {
            push(
                metric,
                EntityShape::sensor(name, DeviceGroup::Health)
                    .icon("mdi:alert-circle-outline")
                    .total_increasing(),
                Payload::value(MetricValue::Int(value as i64)),
            );
        }

        push(
            "connection_status",
            EntityShape::sensor("Connection Status", DeviceGroup::Health)
                .icon("mdi:lan-connect")
                .with_attributes(),
            Payload::value(MetricValue::Text(
                if h.connected { "Connected" } else { "Disconnected" }.to_string(),
            ))
            .attr("subscribed_topics", h.subscribed_topics.clone()),
        );

        out
    }

    /// Latest-observation sensor for one pair; emitted on every retained spot.
    pub fn observation(&self, obs: &PairObservation) -> EntityUpdate {
        let s = &obs.stats;
        let spot = &s.last;
        let round1 = |v: f64| (v * 10.0).round() / 10.0;

        let payload = Payload::value(MetricValue::Int(spot.snr_db as i64))
            .attr("sender", spot.sender.as_str())
            .attr("receiver", spot.receiver.as_str())
            .attr("band", spot.band.as_str())
            .attr("mode", spot.mode.as_str())
            .attr_opt("frequency_hz", spot.frequency_hz)
            .attr_opt("sender_locator", spot.sender_locator.clone())
            .attr_opt("receiver_locator", spot.receiver_locator.clone())
            .attr_opt("sender_region", spot.sender_region.clone())
            .attr_opt("receiver_region", spot.receiver_region.clone())
            .attr_opt("sender_country", spot.sender_info.as_ref().map(|i| i.country.clone()))
            .attr_opt("sender_continent", spot.sender_info.as_ref().map(|i| i.continent.clone()))
            .attr_opt("receiver_country", spot.receiver_info.as_ref().map(|i| i.country.clone()))
            .attr_opt(
                "receiver_continent",
                spot.receiver_info.as_ref().map(|i| i.continent.clone()),
            )
            .attr_opt("sender_lat", spot.sender_coords.map(|c| c.lat))
            .attr_opt("sender_lon", spot.sender_coords.map(|c| c.lon))
            .attr_opt("receiver_lat", spot.receiver_coords.map(|c| c.lat))
            .attr_opt("receiver_lon", spot.receiver_coords.map(|c| c.lon))
            .attr_opt("distance_km", spot.path.map(|p| round1(p.km)))
            .attr_opt("distance_miles", spot.path.map(|p| round1(p.miles)))
            .attr_opt("bearing", spot.path.and_then(|p| p.bearing_deg).map(round1))
            .attr("spot_count", s.count)
            .attr("snr_min", s.snr_min)
            .attr("snr_avg", round1(s.avg_snr()))
            .attr("snr_max", s.snr_max)
            .attr_opt("first_seen", iso_utc(s.first_seen_ms))
            .attr_opt("last_seen", iso_utc(s.last_seen_ms));

        EntityUpdate {
            id: EntityId::new(["spots", obs.key.sender.as_str(), obs.key.receiver.as_str()]),
            shape: EntityShape::sensor(format!("{} to {}", obs.key.sender, obs.key.receiver), DeviceGroup::Spots)
                .unit("dB")
                .icon("mdi:radio-tower")
                .measurement()
                .with_attributes(),
            payload,
            emission: Emission::Always,
        }
    }
}

struct StatsBuilder<'a> {
    station: &'a str,
    scope: StatsScope,
    out: Vec<EntityUpdate>,
}

impl StatsBuilder<'_> {
    fn push(&mut self, key: &[&str], metric: &str, name: String, mut shape: EntityShape, payload: Payload) {
        let segments = ["stats", self.scope.as_str(), self.station]
            .into_iter()
            .chain(key.iter().copied())
            .chain([metric]);
        shape.name = format!("{} {name}", self.scope.as_str().to_ascii_uppercase());
        self.out.push(EntityUpdate {
            id: EntityId::new(segments),
            shape,
            payload,
            emission: Emission::OnChange,
        });
    }

    fn count(&mut self, key: &[&str], metric: &str, name: &str, unit: &'static str, value: u64) {
        let shape = EntityShape::sensor("", DeviceGroup::Stats(self.scope))
            .unit(unit)
            .icon("mdi:counter")
            .measurement();
        self.push(key, metric, name.to_string(), shape, Payload::value(MetricValue::Int(value as i64)));
    }

    fn measure(
        &mut self,
        key: &[&str],
        metric: &str,
        name: String,
        unit: &'static str,
        icon: &'static str,
        value: f64,
    ) {
        let shape = EntityShape::sensor("", DeviceGroup::Stats(self.scope))
            .unit(unit)
            .icon(icon)
            .measurement();
        self.push(key, metric, name, shape, Payload::value(MetricValue::rounded(value)));
    }

    /// `total_min_*`, `total_avg_*`, `total_max_*`; an empty window reads 0.
    fn spread(&mut self, suffix: &str, label: &str, unit: &'static str, icon: &'static str, spread: Option<Spread>) {
        let (min, avg, max) = spread.map_or((0.0, 0.0, 0.0), |s| (s.min, s.avg, s.max));
        for (which, title, v) in [("min", "Min", min), ("avg", "Avg", avg), ("max", "Max", max)] {
            self.measure(&[], &format!("total_{which}_{suffix}"), format!("{title} {label}"), unit, icon, v);
        }
    }

    fn activity(&mut self, metric: &str, name: &str, activity: &Activity, counts_key: &str, counts: Map<String, Value>) {
        let shape = EntityShape::sensor("", DeviceGroup::Stats(self.scope))
            .icon("mdi:chart-bar")
            .with_attributes();
        let payload = Payload::value(MetricValue::Text(
            activity.name.clone().unwrap_or_else(|| NONE.to_string()),
        ))
        .attr("spot_count", activity.count)
        .attr(counts_key, Value::Object(counts));
        self.push(&[], metric, name.to_string(), shape, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::band::Band;
    use crate::health::HealthMonitor;
    use crate::pairs::PairTable;
    use crate::spot::{Mode, PathGeometry, Spot};

    fn spot() -> Spot {
        Spot {
            sender: Callsign::new("DX1").unwrap(),
            receiver: Callsign::new("ME1").unwrap(),
            band: Band::M20,
            mode: Mode::new("FT8").unwrap(),
            snr_db: -10,
            frequency_hz: Some(14_074_000),
            sender_locator: Some("JO62".into()),
            receiver_locator: None,
            sender_region: None,
            receiver_region: None,
            sender_info: None,
            receiver_info: None,
            sender_coords: None,
            receiver_coords: None,
            path: Some(PathGeometry::from_km(8000.0, Some(45.0))),
            reported_at_ms: 1_000,
            received_at_ms: 1_000,
            sequence: None,
        }
    }

    fn find<'a>(updates: &'a [EntityUpdate], path: &str) -> &'a EntityUpdate {
        updates
            .iter()
            .find(|u| u.id.path() == path)
            .unwrap_or_else(|| panic!("missing {path}"))
    }

    #[test]
    fn stats_entities_are_keyed_by_scope_station_and_group() {
        let me = Callsign::new("ME1").unwrap();
        let stats = WindowStats::compute(&[Arc::new(spot())], StatsScope::Rx, Some(&me), 900_000);
        let updates = Catalog::new(Some(&me)).stats(&stats);

        let count = find(&updates, "stats/rx/me1/20m/ft8/count");
        assert_eq!(count.payload.value, MetricValue::Int(1));
        assert_eq!(count.shape.name, "RX 20m FT8 Spots");

        let dist = find(&updates, "stats/rx/me1/20m/ft8/avg_dist");
        assert_eq!(dist.payload.value, MetricValue::Float(8000.0));

        let top = find(&updates, "stats/rx/me1/most_active_band");
        assert_eq!(top.payload.value, MetricValue::Text("20m".into()));
        assert_eq!(top.payload.attributes["spot_count"], json!(1));
        assert_eq!(top.payload.attributes["band_counts"], json!({"20m": 1}));

        find(&updates, "stats/rx/me1/ft8/unique_stations");
        find(&updates, "stats/rx/me1/20m/unique_countries");
        assert!(updates.iter().all(|u| u.emission == Emission::OnChange));
    }

    #[test]
    fn empty_window_reports_zero_and_none() {
        let stats = WindowStats::compute(&[], StatsScope::All, None, 900_000);
        let updates = Catalog::new(None).stats(&stats);

        assert_eq!(find(&updates, "stats/all/global/total_spots").payload.value, MetricValue::Int(0));
        assert_eq!(
            find(&updates, "stats/all/global/total_avg_dist").payload.value,
            MetricValue::Float(0.0)
        );
        assert_eq!(
            find(&updates, "stats/all/global/most_active_mode").payload.value,
            MetricValue::Text("none".into())
        );
        assert_eq!(
            find(&updates, "stats/all/global/last_spot").payload.value,
            MetricValue::Text("none".into())
        );
    }

    #[test]
    fn observation_always_emits_with_pair_attributes() {
        let mut pairs = PairTable::new();
        let obs = pairs.record(&Arc::new(spot()));
        let update = Catalog::new(None).observation(&obs);

        assert_eq!(update.id.path(), "spots/dx1/me1");
        assert_eq!(update.emission, Emission::Always);
        assert_eq!(update.payload.value, MetricValue::Int(-10));
        assert_eq!(update.payload.attributes["distance_km"], json!(8000.0));
        assert_eq!(update.payload.attributes["spot_count"], json!(1));
        assert!(!update.payload.attributes.contains_key("receiver_locator"));
    }

    #[test]
    fn health_entities_cover_feed_state() {
        let h = HealthMonitor::default();
        h.on_connected(0, vec!["t".into()]);
        let updates = Catalog::new(Some(&Callsign::new("ME1").unwrap())).health(&h.snapshot(1_000));

        let feed = find(&updates, "health/me1/feed_health");
        assert_eq!(feed.payload.value, MetricValue::Bool(false));
        assert_eq!(feed.payload.attributes["reason"], json!("No messages received yet"));
        assert_eq!(
            find(&updates, "health/me1/connection_status").payload.value,
            MetricValue::Text("Connected".into())
        );
        find(&updates, "health/me1/sink_failures");
        find(&updates, "health/me1/sequence_gaps");
    }
}
