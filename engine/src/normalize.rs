use std::fmt;
use std::sync::Arc;

use corelib::RawSpot;
use serde_json::Value;
use thiserror::Error;

use crate::band::Band;
use crate::enrich::EnrichmentLookup;
use crate::spot::{Callsign, Coordinates, Mode, PathGeometry, Spot, StationInfo};

/// Locator precision used for distance and bearing.
const PATH_LOCATOR_LEN: usize = 6;
/// Locator precision used for station coordinates.
const COORD_LOCATOR_LEN: usize = 8;
const MIN_LOCATOR_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    Missing,
    WrongType,
    OutOfRange,
    Unrecognized,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Problem::Missing => "is missing",
            Problem::WrongType => "has the wrong type",
            Problem::OutOfRange => "is out of range",
            Problem::Unrecognized => "is not recognized",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("malformed record: payload is not a JSON object ({0})")]
    Undecodable(String),

    #[error("malformed record: `{field}` {problem}")]
    MalformedRecord {
        field: &'static str,
        problem: Problem,
    },
}

impl NormalizeError {
    fn field(field: &'static str, problem: Problem) -> Self {
        NormalizeError::MalformedRecord { field, problem }
    }
}

/// Whose point of view distance and bearing are measured from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Perspective {
    /// From the monitored station towards the counterpart.
    Station(Callsign),
    /// Sender towards receiver.
    Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub spot: Spot,
    /// Enrichment lookups attempted for this record that failed.
    pub enrichment_misses: u32,
}

pub struct Normalizer {
    enrichment: Arc<dyn EnrichmentLookup>,
    perspective: Perspective,
}

impl Normalizer {
    pub fn new(enrichment: Arc<dyn EnrichmentLookup>, perspective: Perspective) -> Self {
        Self {
            enrichment,
            perspective,
        }
    }

    pub fn normalize(
        &self,
        raw: &RawSpot,
        received_at_ms: u64,
    ) -> Result<Normalized, NormalizeError> {
        let sender = callsign(&raw.sender_call, "sc")?;
        let receiver = callsign(&raw.receiver_call, "rc")?;
        let mode = mode(&raw.mode)?;
        let snr_db = snr(&raw.report)?;
        let reported_at_ms = timestamp(&raw.timestamp)?;
        let frequency_hz = frequency(&raw.frequency)?;
        let band = band(&raw.band, frequency_hz)?;
        let sequence = sequence(&raw.sequence)?;
        let feed_distance = feed_distance(&raw.distance_km)?;

        let sender_locator = text(&raw.sender_locator);
        let receiver_locator = text(&raw.receiver_locator);

        let mut misses = 0u32;

        let sender_info = self.station_info(&sender, &mut misses);
        let receiver_info = self.station_info(&receiver, &mut misses);
        let sender_coords = self.coordinates(sender_locator.as_deref(), &mut misses);
        let receiver_coords = self.coordinates(receiver_locator.as_deref(), &mut misses);

        let (from, to) = match &self.perspective {
            Perspective::Station(me) if receiver == *me => (&receiver_locator, &sender_locator),
            _ => (&sender_locator, &receiver_locator),
        };
        let path = self.path(from.as_deref(), to.as_deref(), feed_distance, &mut misses);

        Ok(Normalized {
            spot: Spot {
                sender,
                receiver,
                band,
                mode,
                snr_db,
                frequency_hz,
                sender_locator,
                receiver_locator,
                sender_region: region(&raw.sender_region),
                receiver_region: region(&raw.receiver_region),
                sender_info,
                receiver_info,
                sender_coords,
                receiver_coords,
                path,
                reported_at_ms,
                received_at_ms,
                sequence,
            },
            enrichment_misses: misses,
        })
    }

    fn station_info(&self, call: &Callsign, misses: &mut u32) -> Option<StationInfo> {
        let base = base_callsign(call.as_str());
        match self.enrichment.lookup(&base) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(callsign = %call, base = %base, error = %e, "callsign lookup failed");
                *misses += 1;
                None
            }
        }
    }

    fn coordinates(&self, locator: Option<&str>, misses: &mut u32) -> Option<Coordinates> {
        let locator = truncate_locator(locator?, COORD_LOCATOR_LEN)?;
        match self.enrichment.geo(locator) {
            Ok(c) => Some(c),
            Err(e) => {
                tracing::debug!(locator, error = %e, "locator lookup failed");
                *misses += 1;
                None
            }
        }
    }

    fn path(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        feed_distance: Option<f64>,
        misses: &mut u32,
    ) -> Option<PathGeometry> {
        let locators = from
            .and_then(|l| truncate_locator(l, PATH_LOCATOR_LEN))
            .zip(to.and_then(|l| truncate_locator(l, PATH_LOCATOR_LEN)));

        let computed = locators.and_then(|(a, b)| match self.enrichment.distance_and_bearing(a, b) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::debug!(from = a, to = b, error = %e, "path lookup failed");
                *misses += 1;
                None
            }
        });

        match feed_distance {
            // Relay-provided distance wins; keep the bearing if we have one.
            Some(km) => Some(PathGeometry::from_km(km, computed.and_then(|p| p.bearing_deg))),
            None => computed,
        }
    }
}

/// Strips portable/prefix modifiers so the callsign can be looked up.
///
/// `W1/DL1ABC` → `DL1ABC`, `DL1ABC/P` → `DL1ABC`, `DL1ABC.QRP` → `DL1ABC`.
pub fn base_callsign(call: &str) -> String {
    let call = call.trim().to_ascii_uppercase().replace('.', "/");
    let parts: Vec<&str> = call.split('/').filter(|p| !p.is_empty()).collect();

    let looks_like_call = |p: &str| p.len() > 2 && p.chars().any(|c| c.is_ascii_digit());

    match parts.as_slice() {
        [] => call.clone(),
        [only] => (*only).to_string(),
        [prefix, last] => {
            if looks_like_call(last) && prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
                (*last).to_string()
            } else {
                (*prefix).to_string()
            }
        }
        [first, middle, ..] => {
            if looks_like_call(middle) {
                (*middle).to_string()
            } else {
                (*first).to_string()
            }
        }
    }
}

/// Makes a string safe for use inside entity identifiers and topic paths.
pub fn sanitize_identifier(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '.' | '/' | '#' | '+' => '-',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// First `len` characters of a usable locator, or `None` when it is too
/// short or not plain ASCII alphanumerics.
pub fn truncate_locator(locator: &str, len: usize) -> Option<&str> {
    let locator = locator.trim();
    if locator.len() < MIN_LOCATOR_LEN || !locator.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(&locator[..len.min(locator.len())])
}

fn callsign(v: &Option<Value>, field: &'static str) -> Result<Callsign, NormalizeError> {
    match v {
        None => Err(NormalizeError::field(field, Problem::Missing)),
        Some(Value::String(s)) => {
            Callsign::new(s).ok_or_else(|| NormalizeError::field(field, Problem::Missing))
        }
        Some(_) => Err(NormalizeError::field(field, Problem::WrongType)),
    }
}

fn mode(v: &Option<Value>) -> Result<Mode, NormalizeError> {
    match v {
        None => Err(NormalizeError::field("md", Problem::Missing)),
        Some(Value::String(s)) => {
            Mode::new(s).ok_or_else(|| NormalizeError::field("md", Problem::Unrecognized))
        }
        Some(_) => Err(NormalizeError::field("md", Problem::WrongType)),
    }
}

fn number(v: &Value, field: &'static str) -> Result<f64, NormalizeError> {
    match v.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        Some(_) => Err(NormalizeError::field(field, Problem::OutOfRange)),
        None => Err(NormalizeError::field(field, Problem::WrongType)),
    }
}

fn snr(v: &Option<Value>) -> Result<i32, NormalizeError> {
    let v = v
        .as_ref()
        .ok_or_else(|| NormalizeError::field("rp", Problem::Missing))?;
    Ok(number(v, "rp")?.round() as i32)
}

fn timestamp(v: &Option<Value>) -> Result<u64, NormalizeError> {
    let v = v
        .as_ref()
        .ok_or_else(|| NormalizeError::field("t", Problem::Missing))?;
    let secs = number(v, "t")?;
    if secs <= 0.0 {
        return Err(NormalizeError::field("t", Problem::OutOfRange));
    }
    Ok((secs * 1000.0).round() as u64)
}

fn frequency(v: &Option<Value>) -> Result<Option<u64>, NormalizeError> {
    let Some(v) = v else { return Ok(None) };
    let hz = number(v, "f")?;
    if hz < 0.0 {
        return Err(NormalizeError::field("f", Problem::OutOfRange));
    }
    Ok(Some(hz.round() as u64))
}

fn band(v: &Option<Value>, frequency_hz: Option<u64>) -> Result<Band, NormalizeError> {
    let from_frequency = || frequency_hz.and_then(|hz| Band::from_frequency_hz(hz as f64));
    match v {
        None => from_frequency().ok_or_else(|| NormalizeError::field("b", Problem::Missing)),
        Some(Value::String(s)) => s
            .parse::<Band>()
            .ok()
            .or_else(from_frequency)
            .ok_or_else(|| NormalizeError::field("b", Problem::Unrecognized)),
        Some(_) => Err(NormalizeError::field("b", Problem::WrongType)),
    }
}

fn sequence(v: &Option<Value>) -> Result<Option<u64>, NormalizeError> {
    match v {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| NormalizeError::field("sq", Problem::OutOfRange)),
        Some(_) => Err(NormalizeError::field("sq", Problem::WrongType)),
    }
}

fn feed_distance(v: &Option<Value>) -> Result<Option<f64>, NormalizeError> {
    let Some(v) = v else { return Ok(None) };
    let km = number(v, "d")?;
    if km < 0.0 {
        return Err(NormalizeError::field("d", Problem::OutOfRange));
    }
    Ok(Some(km))
}

fn text(v: &Option<Value>) -> Option<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn region(v: &Option<Value>) -> Option<String> {
    match v {
        Some(Value::Number(n)) => Some(n.to_string()),
        other => text(other),
    }
}
