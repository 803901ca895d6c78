use std::fmt;

use serde::Serialize;

use crate::band::Band;
use crate::normalize::sanitize_identifier;

/// Upper-cased station callsign exactly as reported (modifiers kept).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Callsign(String);

impl Callsign {
    /// `None` for empty input or input containing whitespace/control chars.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return None;
        }
        Some(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operating mode (FT8, CW, JS8, ...), validated and upper-cased.
///
/// Held in the same canonical form its entity ids use, so two spellings
/// that would publish to one entity (`FT-8`, `FT.8`) are one mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Mode(String);

const MAX_MODE_LEN: usize = 32;

impl Mode {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.len() > MAX_MODE_LEN || trimmed.chars().any(|c| c.is_control()) {
            return None;
        }
        let canonical = sanitize_identifier(trimmed).to_ascii_uppercase();
        if canonical.is_empty() {
            return None;
        }
        Some(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Country/continent resolved for a callsign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationInfo {
    pub country: String,
    pub continent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathGeometry {
    pub km: f64,
    pub miles: f64,
    /// Initial great-circle bearing; unknown when the distance came from
    /// the feed and no locators were usable.
    pub bearing_deg: Option<f64>,
}

pub const KM_TO_MILES: f64 = 0.621_371;

impl PathGeometry {
    pub fn from_km(km: f64, bearing_deg: Option<f64>) -> Self {
        Self {
            km,
            miles: km * KM_TO_MILES,
            bearing_deg,
        }
    }
}

/// One validated, enriched reception report. Never mutated after
/// construction; shared as `Arc<Spot>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub sender: Callsign,
    pub receiver: Callsign,
    pub band: Band,
    pub mode: Mode,
    pub snr_db: i32,
    pub frequency_hz: Option<u64>,

    pub sender_locator: Option<String>,
    pub receiver_locator: Option<String>,
    pub sender_region: Option<String>,
    pub receiver_region: Option<String>,

    pub sender_info: Option<StationInfo>,
    pub receiver_info: Option<StationInfo>,
    pub sender_coords: Option<Coordinates>,
    pub receiver_coords: Option<Coordinates>,
    pub path: Option<PathGeometry>,

    /// Feed timestamp, ms.
    pub reported_at_ms: u64,
    /// Local arrival timestamp, ms. Window membership uses this one.
    pub received_at_ms: u64,
    pub sequence: Option<u64>,
}

impl Spot {
    pub fn pair_key(&self) -> PairKey {
        PairKey {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.path.map(|p| p.km)
    }

    pub fn involves(&self, call: &Callsign) -> bool {
        self.sender == *call || self.receiver == *call
    }
}

/// Identity of a directed (sender, receiver) path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub sender: Callsign,
    pub receiver: Callsign,
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.sender, self.receiver)
    }
}
