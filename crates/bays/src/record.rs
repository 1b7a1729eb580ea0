use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

/// Canonical entity: one physical parking bay with every joined attribute.
///
/// Optional fields carry explicit meaning:
/// - `occupied_id` absent: vacant or unmonitored.
/// - `pay_stay_zone` absent: unrestricted, and then `cost_per_hour` and
///   `maximum_stay` are absent too.
/// - `cost_per_hour` absent: treated as free.
/// - `maximum_stay` absent: no duration limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayRecord {
    pub bay_id: String,
    #[serde(default)]
    pub rd_seg_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub occupied_id: Option<String>,
    #[serde(default)]
    pub disability_deviceid: Option<String>,
    #[serde(default)]
    pub pay_stay_zone: Option<String>,
    /// Cents per hour.
    #[serde(default)]
    pub cost_per_hour: Option<u32>,
    /// Minutes.
    #[serde(default)]
    pub maximum_stay: Option<u32>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl BayRecord {
    /// A bay with only an id and a location.
    pub fn new(bay_id: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            bay_id: bay_id.into(),
            rd_seg_id: None,
            latitude: location.lat_deg,
            longitude: location.lon_deg,
            occupied_id: None,
            disability_deviceid: None,
            pay_stay_zone: None,
            cost_per_hour: None,
            maximum_stay: None,
            street: None,
            start_time: None,
            end_time: None,
        }
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied_id.is_some()
    }

    pub fn is_accessible(&self) -> bool {
        self.disability_deviceid.is_some()
    }

    /// No cost data, or an explicit zero cost.
    pub fn is_free(&self) -> bool {
        matches!(self.cost_per_hour, None | Some(0))
    }

    pub fn meter_type(&self) -> &'static str {
        meter_type(self.maximum_stay)
    }
}

/// Sign label for a maximum stay in minutes.
pub fn meter_type(maximum_stay: Option<u32>) -> &'static str {
    match maximum_stay {
        Some(60) => "1P",
        Some(120) => "2P",
        Some(180) => "3P",
        Some(240) => "4P",
        _ => "P",
    }
}
