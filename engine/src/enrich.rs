use thiserror::Error;

use crate::spot::{Coordinates, PathGeometry, StationInfo};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("no prefix entry for callsign `{0}`")]
    UnknownCallsign(String),

    #[error("invalid locator `{0}`")]
    InvalidLocator(String),

    #[error("enrichment unavailable")]
    Unavailable,
}

/// Callsign and locator lookups used by the normalizer.
///
/// Implementations are expected to be in-memory; they run on the arrival
/// path before any engine lock is taken.
pub trait EnrichmentLookup: Send + Sync {
    fn lookup(&self, callsign: &str) -> Result<StationInfo, EnrichmentError>;

    fn geo(&self, locator: &str) -> Result<Coordinates, EnrichmentError>;

    fn distance_and_bearing(&self, from: &str, to: &str) -> Result<PathGeometry, EnrichmentError>;
}

/// Lookup that never resolves anything. Every spot proceeds un-enriched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEnrichment;

impl EnrichmentLookup for NoEnrichment {
    fn lookup(&self, _callsign: &str) -> Result<StationInfo, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn geo(&self, _locator: &str) -> Result<Coordinates, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }

    fn distance_and_bearing(&self, _from: &str, _to: &str) -> Result<PathGeometry, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }
}
