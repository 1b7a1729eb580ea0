/// Mean Earth radius (kilometers) used for great-circle distances.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

/// Geographic coordinates in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub const fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.lat_deg.is_finite() && self.lon_deg.is_finite()
    }

    /// Finite and inside the usual latitude/longitude domain.
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.lat_deg)
            && (-180.0..=180.0).contains(&self.lon_deg)
    }

    pub fn distance_km(self, other: GeoPoint) -> f64 {
        haversine_km(self, other)
    }
}

/// Great-circle distance between two points, in kilometers.
///
/// `2 R asin(sqrt(sin²(Δlat/2) + cos(lat1) cos(lat2) sin²(Δlon/2)))` with
/// `R = EARTH_MEAN_RADIUS_KM`. Never fails: NaN inputs yield NaN.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat_deg.to_radians();
    let lat2 = b.lat_deg.to_radians();
    let dlat = (b.lat_deg - a.lat_deg).to_radians();
    let dlon = (b.lon_deg - a.lon_deg).to_radians();

    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    // Rounding can push sqrt(h) a hair above 1 for antipodal points.
    // `f64::min` would swallow NaN, so compare explicitly.
    let mut s = h.sqrt();
    if s > 1.0 {
        s = 1.0;
    }
    2.0 * EARTH_MEAN_RADIUS_KM * s.asin()
}

/// Degrees of latitude spanned by `km` along a meridian.
pub fn km_to_lat_deg(km: f64) -> f64 {
    km / EARTH_MEAN_RADIUS_KM.to_radians()
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, haversine_km, km_to_lat_deg};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    const FLINDERS_ST: GeoPoint = GeoPoint::new(-37.8183, 144.9671);
    const SYDNEY_CENTRAL: GeoPoint = GeoPoint::new(-33.8830, 151.2067);

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_km(FLINDERS_ST, FLINDERS_ST), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(-37.8105, 144.9628);
        let b = GeoPoint::new(-37.7963, 144.9614);
        assert_eq!(haversine_km(a, b), haversine_km(b, a));
        assert_eq!(
            haversine_km(FLINDERS_ST, SYDNEY_CENTRAL),
            haversine_km(SYDNEY_CENTRAL, FLINDERS_ST)
        );
    }

    #[test]
    fn melbourne_to_sydney() {
        assert_close(haversine_km(FLINDERS_ST, SYDNEY_CENTRAL), 714.0, 5.0);
    }

    #[test]
    fn meridian_offset_matches_requested_km() {
        let origin = GeoPoint::new(-37.8105, 144.9628);
        for km in [0.2, 0.6, 1.5] {
            let p = GeoPoint::new(origin.lat_deg + km_to_lat_deg(km), origin.lon_deg);
            assert_close(haversine_km(origin, p), km, 1e-9);
        }
    }

    #[test]
    fn antipodes_do_not_produce_nan() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        let d = haversine_km(a, b);
        assert!(d.is_finite());
        assert_close(d, std::f64::consts::PI * 6371.0, 1e-6);
    }

    #[test]
    fn nan_input_propagates() {
        let a = GeoPoint::new(f64::NAN, 144.9);
        assert!(haversine_km(a, FLINDERS_ST).is_nan());
        assert!(haversine_km(FLINDERS_ST, a).is_nan());
    }

    #[test]
    fn validity_checks_domain() {
        assert!(FLINDERS_ST.is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_valid());
    }
}
