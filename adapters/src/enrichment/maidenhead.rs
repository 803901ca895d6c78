//! Maidenhead locator math.

use engine::enrich::EnrichmentError;
use engine::spot::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// (alphabet upper bound, lon step, lat step) per character pair.
const PAIRS: [(u8, f64, f64); 4] = [
    (b'R', 20.0, 10.0),
    (b'9', 2.0, 1.0),
    (b'X', 2.0 / 24.0, 1.0 / 24.0),
    (b'9', 2.0 / 240.0, 1.0 / 240.0),
];

/// Centre of the locator square, for 2 to 8 character locators.
pub fn locator_to_coords(locator: &str) -> Result<Coordinates, EnrichmentError> {
    let invalid = || EnrichmentError::InvalidLocator(locator.to_string());
    let bytes = locator.trim().to_ascii_uppercase().into_bytes();
    if bytes.len() < 2 || bytes.len() > 8 || bytes.len() % 2 != 0 {
        return Err(invalid());
    }

    let mut lon = -180.0;
    let mut lat = -90.0;
    let mut last_step = (0.0, 0.0);

    for (chunk, (top, lon_step, lat_step)) in bytes.chunks(2).zip(PAIRS) {
        let base = if top == b'9' { b'0' } else { b'A' };
        let digit = |c: u8| (base..=top).contains(&c).then(|| (c - base) as f64);
        let (Some(x), Some(y)) = (digit(chunk[0]), digit(chunk[1])) else {
            return Err(invalid());
        };
        lon += x * lon_step;
        lat += y * lat_step;
        last_step = (lon_step, lat_step);
    }

    Ok(Coordinates {
        lat: lat + last_step.1 / 2.0,
        lon: lon + last_step.0 / 2.0,
    })
}

/// Haversine distance.
pub fn great_circle_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Initial great-circle bearing from `a` to `b`, degrees in `[0, 360)`.
pub fn initial_bearing(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn square_centre() {
        let c = locator_to_coords("JO62").unwrap();
        assert!(close(c.lat, 52.5, 1e-9));
        assert!(close(c.lon, 13.0, 1e-9));
    }

    #[test]
    fn subsquare_and_extended_refine_position() {
        let four = locator_to_coords("JO62").unwrap();
        let six = locator_to_coords("jo62qm").unwrap();
        let eight = locator_to_coords("JO62QM12").unwrap();
        assert!(close(six.lat, 52.520833, 1e-5));
        assert!(close(six.lon, 13.375, 1e-9));
        assert!(close(four.lat, six.lat, 0.5));
        assert!(close(six.lat, eight.lat, 1.0 / 24.0));
    }

    #[test]
    fn rejects_bad_locators() {
        for bad in ["J", "JO6", "ZZ00", "JO6A", "JO62qm1", "JO62ZZ", "JO62qm12ab"] {
            assert!(locator_to_coords(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn meridian_distance_and_bearing() {
        let a = locator_to_coords("JJ00").unwrap();
        let b = locator_to_coords("JK00").unwrap();
        assert!(close(great_circle_km(a, b), 1111.95, 0.01));
        assert!(close(initial_bearing(a, b), 0.0, 1e-9));
        assert!(close(initial_bearing(b, a), 180.0, 1e-9));
    }

    #[test]
    fn same_point_is_zero_distance() {
        let a = locator_to_coords("FN42").unwrap();
        assert_eq!(great_circle_km(a, a), 0.0);
    }
}
