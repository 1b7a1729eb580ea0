use foundation::math::GeoPoint;
use foundation::math::precision::stable_total_cmp_f64;
use serde::Serialize;

use crate::record::BayRecord;

/// Coordinates closer than this (degrees, per axis) count as the same point.
pub const EXACT_MATCH_EPS_DEG: f64 = 1.0e-9;

/// Resolves a clicked coordinate to a visible bay.
///
/// Ordering contract:
/// - A bay whose centroid equals `clicked` (within [`EXACT_MATCH_EPS_DEG`]) wins outright.
/// - Otherwise the nearest bay by haversine distance wins.
/// - Ties go to the earliest bay in `visible` order.
///
/// Bays with a NaN distance are never selected. With `max_km` set, a nearest
/// bay farther than it yields `None`.
pub fn select_bay<'a, I>(
    visible: I,
    clicked: GeoPoint,
    max_km: Option<f64>,
) -> Option<&'a BayRecord>
where
    I: IntoIterator<Item = &'a BayRecord>,
{
    if !clicked.is_finite() {
        return None;
    }

    let mut best: Option<(&BayRecord, f64)> = None;
    for bay in visible {
        let loc = bay.location();
        if (loc.lat_deg - clicked.lat_deg).abs() <= EXACT_MATCH_EPS_DEG
            && (loc.lon_deg - clicked.lon_deg).abs() <= EXACT_MATCH_EPS_DEG
        {
            return Some(bay);
        }

        let d = loc.distance_km(clicked);
        if d.is_nan() {
            continue;
        }
        let closer = match best {
            None => true,
            Some((_, best_d)) => stable_total_cmp_f64(d, best_d).is_lt(),
        };
        if closer {
            best = Some((bay, d));
        }
    }

    let (bay, d) = best?;
    match max_km {
        Some(max) if d > max => None,
        _ => Some(bay),
    }
}

/// Descriptive fields shown for a selected bay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BayDetails {
    pub bay_id: String,
    pub street: Option<String>,
    /// Cents per hour.
    pub cost_per_hour: Option<u32>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub accessible: bool,
    pub free: bool,
    pub meter_type: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&BayRecord> for BayDetails {
    fn from(bay: &BayRecord) -> Self {
        Self {
            bay_id: bay.bay_id.clone(),
            street: bay.street.clone(),
            cost_per_hour: bay.cost_per_hour,
            start_time: bay.start_time.clone(),
            end_time: bay.end_time.clone(),
            accessible: bay.is_accessible(),
            free: bay.is_free(),
            meter_type: bay.meter_type(),
            latitude: bay.latitude,
            longitude: bay.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BayDetails, select_bay};
    use crate::record::BayRecord;
    use foundation::math::GeoPoint;

    fn bays() -> Vec<BayRecord> {
        vec![
            BayRecord::new("a", GeoPoint::new(-37.8100, 144.9600)),
            BayRecord::new("b", GeoPoint::new(-37.8110, 144.9610)),
            BayRecord::new("c", GeoPoint::new(-37.8200, 144.9700)),
        ]
    }

    #[test]
    fn exact_match_wins() {
        let bays = bays();
        let hit = select_bay(&bays, GeoPoint::new(-37.8110, 144.9610), None);
        assert_eq!(hit.map(|b| b.bay_id.as_str()), Some("b"));
    }

    #[test]
    fn falls_back_to_nearest() {
        let bays = bays();
        let hit = select_bay(&bays, GeoPoint::new(-37.8195, 144.9695), None);
        assert_eq!(hit.map(|b| b.bay_id.as_str()), Some("c"));
    }

    #[test]
    fn coincident_bays_prefer_earliest() {
        let bays = vec![
            BayRecord::new("first", GeoPoint::new(-37.81, 144.961)),
            BayRecord::new("second", GeoPoint::new(-37.81, 144.961)),
        ];
        let hit = select_bay(&bays, GeoPoint::new(-37.81, 144.960), None);
        assert_eq!(hit.map(|b| b.bay_id.as_str()), Some("first"));
    }

    #[test]
    fn respects_tolerance_and_empty_sets() {
        let bays = bays();
        assert!(select_bay(&bays, GeoPoint::new(-37.0, 144.0), Some(1.0)).is_none());
        assert!(select_bay(&bays, GeoPoint::new(-37.0, 144.0), None).is_some());
        let none: Vec<BayRecord> = Vec::new();
        assert!(select_bay(&none, GeoPoint::new(-37.81, 144.96), None).is_none());
        assert!(select_bay(&bays, GeoPoint::new(f64::NAN, 144.96), None).is_none());
    }

    #[test]
    fn details_expose_display_fields() {
        let mut bay = BayRecord::new("7", GeoPoint::new(-37.81, 144.96));
        bay.street = Some("Collins Street".into());
        bay.cost_per_hour = Some(0);
        bay.maximum_stay = Some(120);
        bay.disability_deviceid = Some("D1".into());

        let details = BayDetails::from(&bay);
        assert_eq!(details.meter_type, "2P");
        assert!(details.free);
        assert!(details.accessible);
        assert_eq!(details.street.as_deref(), Some("Collins Street"));

        let json = serde_json::to_value(&details).expect("json");
        assert_eq!(json["meter_type"], "2P");
        assert_eq!(json["bay_id"], "7");
    }
}
