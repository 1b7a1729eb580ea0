//! User-selected filter state and its validation.
//!
//! The filter itself assumes valid criteria and never fails; every value is
//! checked here on its way in.

use foundation::math::GeoPoint;
use serde::{Deserialize, Serialize};

/// Radius inputs are clamped into `[0, MAX_RADIUS_KM]`.
pub const MAX_RADIUS_KM: f64 = 1.0;

/// Melbourne CBD.
pub const DEFAULT_REFERENCE_LOCATION: GeoPoint = GeoPoint::new(-37.8136, 144.9631);

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: Copy + PartialOrd> Range<T> {
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. Incomparable values (NaN) are outside.
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub free_only: bool,
    pub accessible_only: bool,
    /// Kilometers, within `[0, MAX_RADIUS_KM]`.
    pub radius_range: Range<f64>,
    /// Cents per hour.
    pub cost_range: Range<u32>,
    /// Minutes, at least 1.
    pub duration_minimum: u32,
    #[serde(with = "latlon")]
    pub reference_location: GeoPoint,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            free_only: false,
            accessible_only: false,
            radius_range: Range::new(0.0, 0.5),
            cost_range: Range::new(0, 1000),
            duration_minimum: 60,
            reference_location: DEFAULT_REFERENCE_LOCATION,
        }
    }
}

impl FilterCriteria {
    /// Returns the criteria with `patch` applied, or the first invalid field.
    ///
    /// Nothing is applied unless every field in the patch is valid.
    pub fn patched(&self, patch: &CriteriaPatch) -> Result<Self, FilterInputError> {
        let mut out = self.clone();
        if let Some(v) = patch.free_only {
            out.free_only = v;
        }
        if let Some(v) = patch.accessible_only {
            out.accessible_only = v;
        }
        if let Some(r) = patch.radius_range {
            out.radius_range = radius_range(r.min, r.max)?;
        }
        if let Some(r) = patch.cost_range {
            out.cost_range = cost_range(r.min, r.max)?;
        }
        if let Some(v) = patch.duration_minimum {
            out.duration_minimum = duration_minimum(v)?;
        }
        if let Some(loc) = patch.reference_location {
            out.reference_location = reference_location(loc)?;
        }
        Ok(out)
    }

    /// Checks a fully specified criteria set, as read from a file or request.
    pub fn validate(&self) -> Result<(), FilterInputError> {
        let r = radius_range(self.radius_range.min, self.radius_range.max)?;
        if r != self.radius_range {
            return Err(FilterInputError::OutOfDomain {
                field: "radius_range",
            });
        }
        cost_range(f64::from(self.cost_range.min), f64::from(self.cost_range.max))?;
        duration_minimum(i64::from(self.duration_minimum))?;
        reference_location(self.reference_location)?;
        Ok(())
    }
}

/// A partial update to [`FilterCriteria`] with unvalidated, wide-typed values.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaPatch {
    pub free_only: Option<bool>,
    pub accessible_only: Option<bool>,
    pub radius_range: Option<Range<f64>>,
    pub cost_range: Option<Range<f64>>,
    pub duration_minimum: Option<i64>,
    #[serde(with = "latlon::option")]
    pub reference_location: Option<GeoPoint>,
}

impl CriteriaPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterInputError {
    NonFinite { field: &'static str },
    InvertedRange { field: &'static str, min: f64, max: f64 },
    NegativeValue { field: &'static str },
    OutOfDomain { field: &'static str },
    NonPositiveDuration { minutes: i64 },
    LocationOutOfRange { lat: f64, lon: f64 },
}

impl std::fmt::Display for FilterInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterInputError::NonFinite { field } => write!(f, "{field} must be finite"),
            FilterInputError::InvertedRange { field, min, max } => {
                write!(f, "{field} minimum {min} exceeds maximum {max}")
            }
            FilterInputError::NegativeValue { field } => {
                write!(f, "{field} must not be negative")
            }
            FilterInputError::OutOfDomain { field } => write!(f, "{field} is out of range"),
            FilterInputError::NonPositiveDuration { minutes } => {
                write!(f, "duration_minimum must be positive (got {minutes})")
            }
            FilterInputError::LocationOutOfRange { lat, lon } => {
                write!(f, "location ({lat}, {lon}) is not a valid coordinate")
            }
        }
    }
}

impl std::error::Error for FilterInputError {}

/// Clamps into `[0, MAX_RADIUS_KM]` after rejecting NaN/inf and inverted input.
pub fn radius_range(min: f64, max: f64) -> Result<Range<f64>, FilterInputError> {
    let field = "radius_range";
    if !min.is_finite() || !max.is_finite() {
        return Err(FilterInputError::NonFinite { field });
    }
    if min > max {
        return Err(FilterInputError::InvertedRange { field, min, max });
    }
    Ok(Range::new(
        min.clamp(0.0, MAX_RADIUS_KM),
        max.clamp(0.0, MAX_RADIUS_KM),
    ))
}

/// Cents; fractional input rounds to the nearest cent.
pub fn cost_range(min: f64, max: f64) -> Result<Range<u32>, FilterInputError> {
    let field = "cost_range";
    if !min.is_finite() || !max.is_finite() {
        return Err(FilterInputError::NonFinite { field });
    }
    if min < 0.0 || max < 0.0 {
        return Err(FilterInputError::NegativeValue { field });
    }
    if min > max {
        return Err(FilterInputError::InvertedRange { field, min, max });
    }
    if max > f64::from(u32::MAX) {
        return Err(FilterInputError::OutOfDomain { field });
    }
    Ok(Range::new(min.round() as u32, max.round() as u32))
}

pub fn duration_minimum(minutes: i64) -> Result<u32, FilterInputError> {
    if minutes <= 0 {
        return Err(FilterInputError::NonPositiveDuration { minutes });
    }
    u32::try_from(minutes).map_err(|_| FilterInputError::OutOfDomain {
        field: "duration_minimum",
    })
}

pub fn reference_location(point: GeoPoint) -> Result<GeoPoint, FilterInputError> {
    if !point.is_valid() {
        return Err(FilterInputError::LocationOutOfRange {
            lat: point.lat_deg,
            lon: point.lon_deg,
        });
    }
    Ok(point)
}

/// `{"lat": .., "lon": ..}` wire form for [`GeoPoint`].
pub mod latlon {
    use foundation::math::GeoPoint;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LatLon {
        pub lat: f64,
        pub lon: f64,
    }

    impl From<GeoPoint> for LatLon {
        fn from(p: GeoPoint) -> Self {
            Self {
                lat: p.lat_deg,
                lon: p.lon_deg,
            }
        }
    }

    impl From<LatLon> for GeoPoint {
        fn from(p: LatLon) -> Self {
            GeoPoint::new(p.lat, p.lon)
        }
    }

    pub fn serialize<S: Serializer>(point: &GeoPoint, s: S) -> Result<S::Ok, S::Error> {
        LatLon::from(*point).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<GeoPoint, D::Error> {
        LatLon::deserialize(d).map(GeoPoint::from)
    }

    pub mod option {
        use super::LatLon;
        use foundation::math::GeoPoint;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            point: &Option<GeoPoint>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            point.map(LatLon::from).serialize(s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<GeoPoint>, D::Error> {
            Ok(Option::<LatLon>::deserialize(d)?.map(GeoPoint::from))
        }
    }
}
