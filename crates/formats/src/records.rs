//! Normalized rows delivered by each source, before fusion.
//!
//! Join keys are already coerced to their canonical text form (see
//! `coerce::normalize_key`), so fusion can compare them directly.

use foundation::math::GeoPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct BayGeometry {
    pub bay_id: String,
    pub rd_seg_id: Option<String>,
    pub street: Option<String>,
    /// Polygon centroid, computed once at parse time.
    pub centroid: GeoPoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyRecord {
    pub bay_id: String,
    /// Present iff the sensor reports the bay occupied.
    pub occupied_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabilityRecord {
    pub bay_id: String,
    pub disability_deviceid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSegmentRecord {
    pub rd_seg_id: String,
    pub pay_stay_zone: Option<String>,
    pub street: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCostRecord {
    pub pay_stay_zone: String,
    /// Cents per hour.
    pub cost_per_hour: Option<u32>,
    /// Minutes.
    pub maximum_stay: Option<u32>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

/// Rows parsed from one source plus the number of rows dropped for a
/// missing join key.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> Parsed<T> {
    pub fn new(rows: Vec<T>, skipped: usize) -> Self {
        Self { rows, skipped }
    }
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}
