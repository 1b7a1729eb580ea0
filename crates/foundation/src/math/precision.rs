//! Deterministic float ordering.
//!
//! Distances feed "nearest bay" decisions; sorting them must not depend on
//! signed zeros or NaN payloads.

use core::cmp::Ordering;

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        // Handles +0.0 and -0.0.
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats. NaN sorts after every number.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

#[cfg(test)]
mod tests {
    use super::{canonical_f64, stable_total_cmp_f64};
    use core::cmp::Ordering;

    #[test]
    fn canonicalizes_negative_zero() {
        assert_eq!(canonical_f64(-0.0), 0.0);
        assert_eq!(stable_total_cmp_f64(-0.0, 0.0), Ordering::Equal);
    }

    #[test]
    fn nan_sorts_last() {
        let mut v = vec![f64::NAN, 0.6, -f64::NAN, 0.2];
        v.sort_by(|a, b| stable_total_cmp_f64(*a, *b));
        assert_eq!(v[0], 0.2);
        assert_eq!(v[1], 0.6);
        assert!(v[2].is_nan() && v[3].is_nan());
        assert_eq!(stable_total_cmp_f64(f64::NAN, -f64::NAN), Ordering::Equal);
    }
}
