//! Window statistics, recomputed from scratch for every snapshot.
//!
//! Nothing here keeps state between calls: the same snapshot always yields
//! the same [`WindowStats`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::band::Band;
use crate::filter::{Direction, MonitorMode};
use crate::spot::{Callsign, Mode, Spot};

/// Which side of the monitored station a set of statistics covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatsScope {
    Rx,
    Tx,
    All,
}

impl StatsScope {
    pub fn as_str(self) -> &'static str {
        match self {
            StatsScope::Rx => "rx",
            StatsScope::Tx => "tx",
            StatsScope::All => "all",
        }
    }

    /// Scopes computed on every tick for the given monitor mode.
    pub fn for_mode(mode: &MonitorMode) -> Vec<StatsScope> {
        match mode {
            MonitorMode::Detailed { direction, .. } => match direction {
                Direction::Rx => vec![StatsScope::Rx],
                Direction::Tx => vec![StatsScope::Tx],
                Direction::Dual => vec![StatsScope::Rx, StatsScope::Tx],
            },
            MonitorMode::Summary { .. } => vec![StatsScope::All],
        }
    }

    pub fn includes(self, spot: &Spot, station: Option<&Callsign>) -> bool {
        match (self, station) {
            (StatsScope::Rx, Some(me)) => spot.receiver == *me,
            (StatsScope::Tx, Some(me)) => spot.sender == *me,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl Spread {
    fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (min, max, sum) = values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), v| (min.min(*v), max.max(*v), sum + v),
        );
        Some(Self {
            min,
            avg: sum / values.len() as f64,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub count: u64,
    pub unique_stations: usize,
    pub avg_distance_km: Option<f64>,
    pub avg_snr: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandStats {
    pub count: u64,
    pub unique_regions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeStats {
    pub count: u64,
    pub unique_stations: usize,
}

/// Most-frequent value; `name` is `None` for an empty window.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub name: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
    pub total_spots: u64,
    pub unique_stations: usize,
    pub distance_km: Option<Spread>,
    pub snr: Option<Spread>,
    pub unique_regions: usize,
    pub active_bands: usize,
    pub spots_per_minute: f64,
    pub last_spot_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub scope: StatsScope,
    pub groups: BTreeMap<(Band, Mode), GroupStats>,
    pub bands: BTreeMap<Band, BandStats>,
    pub modes: BTreeMap<Mode, ModeStats>,
    pub global: GlobalStats,
    pub most_active_band: Activity,
    pub most_active_mode: Activity,
}

#[derive(Default)]
struct GroupAcc<'a> {
    count: u64,
    stations: HashSet<&'a str>,
    distance_sum: f64,
    distance_n: u64,
    snr_sum: i64,
}

#[derive(Default)]
struct BandAcc<'a> {
    count: u64,
    regions: HashSet<&'a str>,
}

#[derive(Default)]
struct ModeAcc<'a> {
    count: u64,
    stations: HashSet<&'a str>,
}

impl WindowStats {
    pub fn compute(
        snapshot: &[Arc<Spot>],
        scope: StatsScope,
        station: Option<&Callsign>,
        window_ms: u64,
    ) -> Self {
        let mut groups: HashMap<(Band, &Mode), GroupAcc<'_>> = HashMap::new();
        let mut bands: HashMap<Band, BandAcc<'_>> = HashMap::new();
        let mut modes: HashMap<&Mode, ModeAcc<'_>> = HashMap::new();

        let mut stations: HashSet<&str> = HashSet::new();
        let mut regions: HashSet<&str> = HashSet::new();
        let mut distances = Vec::new();
        let mut snrs = Vec::new();
        let mut total = 0u64;
        let mut last_spot_ms = None;

        for spot in snapshot.iter().filter(|s| scope.includes(s, station)) {
            total += 1;
            let calls = [spot.sender.as_str(), spot.receiver.as_str()];
            let spot_regions = party_regions(spot);

            let g = groups.entry((spot.band, &spot.mode)).or_default();
            g.count += 1;
            g.stations.extend(calls);
            g.snr_sum += spot.snr_db as i64;
            if let Some(km) = spot.distance_km() {
                g.distance_sum += km;
                g.distance_n += 1;
            }

            let b = bands.entry(spot.band).or_default();
            b.count += 1;
            b.regions.extend(spot_regions.into_iter().flatten());

            let m = modes.entry(&spot.mode).or_default();
            m.count += 1;
            m.stations.extend(calls);

            stations.extend(calls);
            regions.extend(spot_regions.into_iter().flatten());
            if let Some(km) = spot.distance_km() {
                distances.push(km);
            }
            snrs.push(spot.snr_db as f64);
            last_spot_ms = last_spot_ms.max(Some(spot.reported_at_ms));
        }

        let window_minutes = window_ms as f64 / 60_000.0;
        let spots_per_minute = if window_minutes > 0.0 {
            total as f64 / window_minutes
        } else {
            total as f64
        };

        let most_active_band = most_active(bands.iter().map(|(b, acc)| (b.as_str(), acc.count)));
        let most_active_mode = most_active(modes.iter().map(|(m, acc)| (m.as_str(), acc.count)));

        Self {
            scope,
            groups: groups
                .into_iter()
                .map(|((band, mode), acc)| {
                    let stats = GroupStats {
                        count: acc.count,
                        unique_stations: acc.stations.len(),
                        avg_distance_km: (acc.distance_n > 0)
                            .then(|| acc.distance_sum / acc.distance_n as f64),
                        avg_snr: acc.snr_sum as f64 / acc.count as f64,
                    };
                    ((band, mode.clone()), stats)
                })
                .collect(),
            global: GlobalStats {
                total_spots: total,
                unique_stations: stations.len(),
                distance_km: Spread::of(&distances),
                snr: Spread::of(&snrs),
                unique_regions: regions.len(),
                active_bands: bands.len(),
                spots_per_minute,
                last_spot_ms,
            },
            bands: bands
                .into_iter()
                .map(|(band, acc)| {
                    let stats = BandStats {
                        count: acc.count,
                        unique_regions: acc.regions.len(),
                    };
                    (band, stats)
                })
                .collect(),
            modes: modes
                .into_iter()
                .map(|(mode, acc)| {
                    let stats = ModeStats {
                        count: acc.count,
                        unique_stations: acc.stations.len(),
                    };
                    (mode.clone(), stats)
                })
                .collect(),
            most_active_band,
            most_active_mode,
        }
    }
}

/// A party's region: the feed's region code, else the enriched country.
fn party_regions(spot: &Spot) -> [Option<&str>; 2] {
    [
        spot.sender_region
            .as_deref()
            .or(spot.sender_info.as_ref().map(|i| i.country.as_str())),
        spot.receiver_region
            .as_deref()
            .or(spot.receiver_info.as_ref().map(|i| i.country.as_str())),
    ]
}

/// Highest count wins; equal counts go to the lexicographically smaller name.
fn most_active<'a>(entries: impl Iterator<Item = (&'a str, u64)>) -> Activity {
    let mut best: Option<(&'a str, u64)> = None;
    for (name, count) in entries {
        let replace = match best {
            None => true,
            Some((b_name, b_count)) => count > b_count || (count == b_count && name < b_name),
        };
        if replace {
            best = Some((name, count));
        }
    }
    match best {
        Some((name, count)) => Activity {
            name: Some(name.to_string()),
            count,
        },
        None => Activity {
            name: None,
            count: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spot::PathGeometry;

    const WINDOW: u64 = 15 * 60_000;

    fn spot(sender: &str, receiver: &str, band: Band, mode: &str) -> Spot {
        Spot {
            sender: Callsign::new(sender).unwrap(),
            receiver: Callsign::new(receiver).unwrap(),
            band,
            mode: Mode::new(mode).unwrap(),
            snr_db: 0,
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
            reported_at_ms: 1_000,
            received_at_ms: 1_000,
            sequence: None,
        }
    }

    fn arcs(spots: Vec<Spot>) -> Vec<Arc<Spot>> {
        spots.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn single_spot_scenario() {
        let mut s = spot("DX1", "ME1", Band::M20, "FT8");
        s.path = Some(PathGeometry::from_km(8000.0, None));
        s.snr_db = -10;

        let stats = WindowStats::compute(&arcs(vec![s]), StatsScope::All, None, WINDOW);
        let key = (Band::M20, Mode::new("FT8").unwrap());
        let group = &stats.groups[&key];

        assert_eq!(group.count, 1);
        assert_eq!(group.unique_stations, 2);
        assert_eq!(group.avg_distance_km, Some(8000.0));
        assert_eq!(group.avg_snr, -10.0);
        assert_eq!(stats.global.total_spots, 1);
        assert_eq!(stats.most_active_band.name.as_deref(), Some("20m"));
        assert_eq!(stats.most_active_band.count, 1);
        assert_eq!(stats.global.distance_km.unwrap().max, 8000.0);
    }

    #[test]
    fn empty_window_reports_none() {
        let stats = WindowStats::compute(&[], StatsScope::All, None, WINDOW);
        assert!(stats.groups.is_empty());
        assert_eq!(stats.global.total_spots, 0);
        assert_eq!(stats.global.distance_km, None);
        assert_eq!(stats.global.spots_per_minute, 0.0);
        assert_eq!(
            stats.most_active_band,
            Activity {
                name: None,
                count: 0
            }
        );
    }

    #[test]
    fn tie_break_prefers_smaller_name() {
        let spots = arcs(vec![
            spot("A1", "B1", Band::M40, "FT8"),
            spot("A2", "B2", Band::M20, "FT8"),
            spot("A3", "B3", Band::M40, "CW"),
            spot("A4", "B4", Band::M20, "CW"),
        ]);
        for _ in 0..20 {
            let stats = WindowStats::compute(&spots, StatsScope::All, None, WINDOW);
            assert_eq!(stats.most_active_band.name.as_deref(), Some("20m"));
            assert_eq!(stats.most_active_mode.name.as_deref(), Some("CW"));
        }
    }

    #[test]
    fn compute_is_idempotent() {
        let mut far = spot("A1", "ME1", Band::M20, "FT8");
        far.path = Some(PathGeometry::from_km(3000.0, None));
        far.sender_region = Some("230".into());
        let spots = arcs(vec![
            far,
            spot("A2", "ME1", Band::M20, "FT8"),
            spot("ME1", "B1", Band::M10, "FT4"),
        ]);
        let a = WindowStats::compute(&spots, StatsScope::All, None, WINDOW);
        let b = WindowStats::compute(&spots, StatsScope::All, None, WINDOW);
        assert_eq!(a, b);
    }

    #[test]
    fn scopes_partition_by_direction() {
        let me = Callsign::new("ME1").unwrap();
        let spots = arcs(vec![
            spot("DX1", "ME1", Band::M20, "FT8"),
            spot("DX2", "ME1", Band::M20, "FT8"),
            spot("ME1", "DX3", Band::M40, "FT8"),
        ]);
        let rx = WindowStats::compute(&spots, StatsScope::Rx, Some(&me), WINDOW);
        let tx = WindowStats::compute(&spots, StatsScope::Tx, Some(&me), WINDOW);
        assert_eq!(rx.global.total_spots, 2);
        assert_eq!(rx.global.unique_stations, 3);
        assert_eq!(tx.global.total_spots, 1);
        assert_eq!(tx.most_active_band.name.as_deref(), Some("40m"));
    }

    #[test]
    fn averages_skip_unknown_distances() {
        let mut a = spot("A1", "B1", Band::M20, "FT8");
        a.path = Some(PathGeometry::from_km(1000.0, None));
        let mut b = spot("A2", "B1", Band::M20, "FT8");
        b.path = Some(PathGeometry::from_km(3000.0, None));
        let c = spot("A3", "B1", Band::M20, "FT8");

        let stats = WindowStats::compute(&arcs(vec![a, b, c]), StatsScope::All, None, WINDOW);
        let g = stats.groups.values().next().unwrap();
        assert_eq!(g.count, 3);
        assert_eq!(g.unique_stations, 4);
        assert_eq!(g.avg_distance_km, Some(2000.0));
        assert_eq!(stats.global.distance_km.unwrap().min, 1000.0);
    }

    #[test]
    fn band_regions_use_codes_then_countries() {
        let mut a = spot("A1", "B1", Band::M20, "FT8");
        a.sender_region = Some("230".into());
        a.receiver_region = Some("291".into());
        let mut b = spot("A2", "B1", Band::M20, "FT8");
        b.sender_region = Some("230".into());
        let stats = WindowStats::compute(&arcs(vec![a, b]), StatsScope::All, None, WINDOW);
        assert_eq!(stats.bands[&Band::M20].unique_regions, 2);
        assert_eq!(stats.global.unique_regions, 2);
        assert_eq!(stats.modes[&Mode::new("FT8").unwrap()].count, 2);
    }

    #[test]
    fn spots_per_minute_uses_window_length() {
        let spots = arcs((0..30).map(|_| spot("A1", "B1", Band::M20, "FT8")).collect());
        let stats = WindowStats::compute(&spots, StatsScope::All, None, WINDOW);
        assert_eq!(stats.global.spots_per_minute, 2.0);
    }
}
