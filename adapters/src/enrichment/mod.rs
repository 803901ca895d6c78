//! In-memory enrichment: prefix table for callsigns, Maidenhead math for
//! locators.

pub mod maidenhead;
pub mod prefix_table;

use engine::enrich::{EnrichmentError, EnrichmentLookup};
use engine::spot::{Coordinates, PathGeometry, StationInfo};

pub use prefix_table::{PrefixTable, PrefixTableError};

pub struct HamEnrichment {
    prefixes: PrefixTable,
}

impl HamEnrichment {
    pub fn new(prefixes: PrefixTable) -> Self {
        Self { prefixes }
    }
}

impl EnrichmentLookup for HamEnrichment {
    fn lookup(&self, callsign: &str) -> Result<StationInfo, EnrichmentError> {
        self.prefixes
            .lookup(callsign)
            .cloned()
            .ok_or_else(|| EnrichmentError::UnknownCallsign(callsign.to_string()))
    }

    fn geo(&self, locator: &str) -> Result<Coordinates, EnrichmentError> {
        maidenhead::locator_to_coords(locator)
    }

    fn distance_and_bearing(&self, from: &str, to: &str) -> Result<PathGeometry, EnrichmentError> {
        let a = maidenhead::locator_to_coords(from)?;
        let b = maidenhead::locator_to_coords(to)?;
        Ok(PathGeometry::from_km(
            maidenhead::great_circle_km(a, b),
            Some(maidenhead::initial_bearing(a, b)),
        ))
    }
}
