use std::collections::HashMap;
use std::sync::Arc;

use crate::spot::{PairKey, Spot};

/// Running per-(sender, receiver) statistics for retained spots.
#[derive(Debug, Clone, PartialEq)]
pub struct PairStats {
    pub count: u64,
    pub snr_sum: i64,
    pub snr_min: i32,
    pub snr_max: i32,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub last_arrival_ms: u64,
    pub last: Arc<Spot>,
}

impl PairStats {
    fn new(spot: &Arc<Spot>) -> Self {
        Self {
            count: 1,
            snr_sum: spot.snr_db as i64,
            snr_min: spot.snr_db,
            snr_max: spot.snr_db,
            first_seen_ms: spot.reported_at_ms,
            last_seen_ms: spot.reported_at_ms,
            last_arrival_ms: spot.received_at_ms,
            last: Arc::clone(spot),
        }
    }

    fn update(&mut self, spot: &Arc<Spot>) {
        self.count += 1;
        self.snr_sum += spot.snr_db as i64;
        self.snr_min = self.snr_min.min(spot.snr_db);
        self.snr_max = self.snr_max.max(spot.snr_db);
        self.first_seen_ms = self.first_seen_ms.min(spot.reported_at_ms);
        self.last_seen_ms = self.last_seen_ms.max(spot.reported_at_ms);
        self.last_arrival_ms = self.last_arrival_ms.max(spot.received_at_ms);
        self.last = Arc::clone(spot);
    }

    pub fn avg_snr(&self) -> f64 {
        self.snr_sum as f64 / self.count as f64
    }
}

/// Copy of a pair's state right after a retained spot was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PairObservation {
    pub key: PairKey,
    pub stats: PairStats,
    pub first: bool,
}

#[derive(Debug, Default)]
pub struct PairTable {
    pairs: HashMap<PairKey, PairStats>,
}

impl PairTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, spot: &Arc<Spot>) -> PairObservation {
        let key = spot.pair_key();
        let mut first = false;
        let stats = self
            .pairs
            .entry(key.clone())
            .and_modify(|s| s.update(spot))
            .or_insert_with(|| {
                first = true;
                PairStats::new(spot)
            });
        PairObservation {
            key,
            stats: stats.clone(),
            first,
        }
    }

    /// Removes pairs whose last arrival is older than `ttl_ms`. Returns how
    /// many were removed.
    pub fn prune_idle(&mut self, now_ms: u64, ttl_ms: u64) -> usize {
        let before = self.pairs.len();
        self.pairs
            .retain(|_, s| now_ms.saturating_sub(s.last_arrival_ms) <= ttl_ms);
        before - self.pairs.len()
    }

    pub fn get(&self, key: &PairKey) -> Option<&PairStats> {
        self.pairs.get(key)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::Band;
    use crate::spot::{Callsign, Mode};

    fn spot(sender: &str, snr_db: i32, at: u64) -> Arc<Spot> {
        Arc::new(Spot {
            sender: Callsign::new(sender).unwrap(),
            receiver: Callsign::new("ME1").unwrap(),
            band: Band::M40,
            mode: Mode::new("CW").unwrap(),
            snr_db,
            frequency_hz: None,
            sender_locator: None,
            receiver_locator: None,
            sender_region: None,
            receiver_region: None,
            sender_info: None,
            receiver_info: None,
            sender_coords: None,
            receiver_coords: None,
            path: None,
            reported_at_ms: at,
            received_at_ms: at,
            sequence: None,
        })
    }

    #[test]
    fn accumulates_running_stats() {
        let mut t = PairTable::new();
        assert!(t.record(&spot("DX1", -10, 1_000)).first);
        t.record(&spot("DX1", 4, 3_000));
        let obs = t.record(&spot("DX1", -3, 2_000));

        assert!(!obs.first);
        assert_eq!(obs.stats.count, 3);
        assert_eq!(obs.stats.snr_min, -10);
        assert_eq!(obs.stats.snr_max, 4);
        assert_eq!(obs.stats.last.snr_db, -3);
        assert_eq!(obs.stats.first_seen_ms, 1_000);
        assert_eq!(obs.stats.last_seen_ms, 3_000);
        assert!((obs.stats.avg_snr() - (-3.0)).abs() < 1e-9);
    }

    #[test]
    fn prunes_only_idle_pairs() {
        let mut t = PairTable::new();
        t.record(&spot("DX1", 0, 0));
        t.record(&spot("DX2", 0, 5_000));

        assert_eq!(t.prune_idle(6_000, 2_000), 1);
        assert_eq!(t.len(), 1);
        assert!(t.get(&spot("DX2", 0, 0).pair_key()).is_some());
    }
}
