//! Proximity rings drawn around the reference location.
//!
//! A pure lookup keyed by `radius_range.max`: every full 0.25 km step adds
//! one ring, up to four.

use serde::Serialize;

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RadarRing {
    pub radius_m: u32,
    pub opacity: f64,
}

impl RadarRing {
    pub const fn new(radius_m: u32, opacity: f64) -> Self {
        Self { radius_m, opacity }
    }
}

pub const BAND_STEP_KM: f64 = 0.25;

pub const RADAR_RINGS: [RadarRing; 4] = [
    RadarRing::new(250, 0.12),
    RadarRing::new(500, 0.09),
    RadarRing::new(750, 0.06),
    RadarRing::new(1000, 0.03),
];

/// Number of rings for a radius maximum: 0 through 4. NaN gives 0.
pub fn radar_band(max_km: f64) -> usize {
    let steps = (max_km / BAND_STEP_KM).floor();
    if steps.is_nan() || steps < 1.0 {
        return 0;
    }
    (steps as usize).min(RADAR_RINGS.len())
}

pub fn radar_rings(max_km: f64) -> &'static [RadarRing] {
    &RADAR_RINGS[..radar_band(max_km)]
}
