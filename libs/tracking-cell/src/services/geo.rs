// libs/tracking-cell/src/services/geo.rs
//! Great-circle distance via the Haversine formula.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in decimal degrees, in meters.
///
/// Callers are responsible for range-checking inputs ([-90,90], [-180,180]);
/// out-of-range values produce a mathematically defined but meaningless
/// result rather than an error.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let d = distance_meters(47.2529, -122.4443, 47.2529, -122.4443);
        assert!(d.abs() < 1e-6, "expected ~0, got {}", d);
    }

    #[test]
    fn tacoma_to_seattle_sanity() {
        // Tacoma to Seattle is roughly 40 km as the crow flies.
        let d = distance_meters(47.2529, -122.4443, 47.6062, -122.3321);
        assert!(d > 35_000.0 && d < 45_000.0, "got {}", d);
    }

    #[test]
    fn short_hop_across_town() {
        let d = distance_meters(47.24, -122.44, 47.25, -122.45);
        assert!(d > 1_200.0 && d < 1_500.0, "got {}", d);
    }

    #[test]
    fn symmetric() {
        let forward = distance_meters(47.24, -122.44, 47.61, -122.33);
        let back = distance_meters(47.61, -122.33, 47.24, -122.44);
        assert!((forward - back).abs() < 1e-6);
    }
}
