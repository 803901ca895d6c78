use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::band::Band;
use crate::spot::{Callsign, Mode, Spot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Spots of the monitored station being heard.
    Tx,
    /// Spots the monitored station heard.
    Rx,
    Dual,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
            Direction::Dual => "dual",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rx" => Ok(Direction::Rx),
            "tx" => Ok(Direction::Tx),
            "dual" => Ok(Direction::Dual),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMode {
    /// One station, tracked pair by pair.
    Detailed {
        callsign: Callsign,
        direction: Direction,
    },
    /// Aggregates only, over a sampled fraction of the global feed.
    Summary { sample_fraction: f64 },
}

/// Detailed-tracking policy plus the subscription-level filters.
///
/// Callsign and region lists hold upper-cased entries; an empty list
/// means no restriction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPolicy {
    pub spot_sensors_enabled: bool,
    pub min_distance_km: f64,
    /// Upper bound on path length; 0 means no limit.
    pub max_distance_km: f64,
    pub allow_callsigns: HashSet<String>,
    pub deny_callsigns: HashSet<String>,
    pub allow_regions: HashSet<String>,
    pub deny_regions: HashSet<String>,
    pub modes: HashSet<Mode>,
    pub bands: HashSet<Band>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountReason {
    SpotSensorsDisabled,
    DeniedCallsign,
    CallsignNotAllowed,
    DeniedRegion,
    RegionNotAllowed,
    TooClose,
    TooFar,
    SummaryMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    WrongDirection,
    ModeFiltered,
    BandFiltered,
    Sampled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Tracked per pair and counted.
    Retained,
    /// Counted in the window and aggregates only.
    CountedOnly(CountReason),
    /// Not counted at all.
    Dropped(DropReason),
}

/// Keeps an exact fraction of arrivals without locking: arrival `n` is kept
/// when `floor((n + 1) * f) > floor(n * f)`.
#[derive(Debug)]
pub struct Sampler {
    fraction: f64,
    seen: AtomicU64,
}

impl Sampler {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            seen: AtomicU64::new(0),
        }
    }

    pub fn keep(&self) -> bool {
        if self.fraction >= 1.0 {
            return true;
        }
        let n = self.seen.fetch_add(1, Ordering::Relaxed) as f64;
        ((n + 1.0) * self.fraction).floor() > (n * self.fraction).floor()
    }
}

#[derive(Debug)]
pub struct FilterEngine {
    mode: MonitorMode,
    policy: FilterPolicy,
    sampler: Sampler,
}

impl FilterEngine {
    pub fn new(mode: MonitorMode, policy: FilterPolicy) -> Self {
        let fraction = match &mode {
            MonitorMode::Summary { sample_fraction } => *sample_fraction,
            MonitorMode::Detailed { .. } => 1.0,
        };
        Self {
            mode,
            policy,
            sampler: Sampler::new(fraction),
        }
    }

    pub fn mode(&self) -> &MonitorMode {
        &self.mode
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    pub fn evaluate(&self, spot: &Spot) -> FilterDecision {
        if let Some(reason) = self.subscription_drop(spot) {
            return FilterDecision::Dropped(reason);
        }
        match &self.mode {
            MonitorMode::Summary { .. } => {
                if self.sampler.keep() {
                    FilterDecision::CountedOnly(CountReason::SummaryMode)
                } else {
                    FilterDecision::Dropped(DropReason::Sampled)
                }
            }
            MonitorMode::Detailed { .. } => match self.detail_policy(spot) {
                Some(reason) => FilterDecision::CountedOnly(reason),
                None => FilterDecision::Retained,
            },
        }
    }

    fn subscription_drop(&self, spot: &Spot) -> Option<DropReason> {
        if let MonitorMode::Detailed {
            callsign,
            direction,
        } = &self.mode
        {
            let wanted = match direction {
                Direction::Rx => spot.receiver == *callsign,
                Direction::Tx => spot.sender == *callsign,
                Direction::Dual => spot.involves(callsign),
            };
            if !wanted {
                return Some(DropReason::WrongDirection);
            }
        }
        if !self.policy.modes.is_empty() && !self.policy.modes.contains(&spot.mode) {
            return Some(DropReason::ModeFiltered);
        }
        if !self.policy.bands.is_empty() && !self.policy.bands.contains(&spot.band) {
            return Some(DropReason::BandFiltered);
        }
        None
    }

    fn detail_policy(&self, spot: &Spot) -> Option<CountReason> {
        let p = &self.policy;

        if !p.spot_sensors_enabled {
            return Some(CountReason::SpotSensorsDisabled);
        }

        let calls = [spot.sender.as_str(), spot.receiver.as_str()];
        if !p.deny_callsigns.is_empty() && calls.iter().any(|c| p.deny_callsigns.contains(*c)) {
            return Some(CountReason::DeniedCallsign);
        }
        if !p.allow_callsigns.is_empty() && !calls.iter().any(|c| p.allow_callsigns.contains(*c)) {
            return Some(CountReason::CallsignNotAllowed);
        }

        let regions = region_keys(spot);
        if !p.deny_regions.is_empty() && regions.iter().any(|r| p.deny_regions.contains(r)) {
            return Some(CountReason::DeniedRegion);
        }
        if !p.allow_regions.is_empty() && !regions.iter().any(|r| p.allow_regions.contains(r)) {
            return Some(CountReason::RegionNotAllowed);
        }

        if p.min_distance_km > 0.0 {
            match spot.distance_km() {
                Some(km) if km >= p.min_distance_km => {}
                _ => return Some(CountReason::TooClose),
            }
        }
        // Unknown distance passes; only a known path can be too long.
        if p.max_distance_km > 0.0
            && spot.distance_km().is_some_and(|km| km > p.max_distance_km)
        {
            return Some(CountReason::TooFar);
        }

        None
    }
}

/// Region identifiers a spot can be matched on: the feed's region codes
/// and the enriched country names of both parties, upper-cased.
fn region_keys(spot: &Spot) -> Vec<String> {
    [
        spot.sender_region.as_deref(),
        spot.receiver_region.as_deref(),
        spot.sender_info.as_ref().map(|i| i.country.as_str()),
        spot.receiver_info.as_ref().map(|i| i.country.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(|r| r.trim().to_ascii_uppercase())
    .collect()
}
