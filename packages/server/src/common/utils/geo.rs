use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance in meters using the haversine formula.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// True when `point` lies within `radius_m` of `center`. The boundary counts as inside.
pub fn within_radius(center: GeoPoint, point: GeoPoint, radius_m: f64) -> bool {
    haversine_m(center, point) <= radius_m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_is_zero() {
        let p = GeoPoint::new(14.6928, -17.4467);
        assert_eq!(haversine_m(p, p), 0.0);
        assert!(within_radius(p, p, 0.0));
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let d = haversine_m(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111_195.08).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_boundary_is_inside() {
        let center = GeoPoint::new(48.8566, 2.3522);
        let point = GeoPoint::new(48.8600, 2.3522);
        let d = haversine_m(center, point);
        assert!(within_radius(center, point, d));
        assert!(!within_radius(center, point, d - 0.01));
    }

    #[test]
    fn test_validity() {
        assert!(GeoPoint::new(90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
