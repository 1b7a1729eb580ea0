//! Visible-bay filter: a pure function of the fused collection and the
//! current criteria.
//!
//! Predicates, in order:
//! 1. distance to the reference location (haversine)
//! 2. distance within `radius_range`, inclusive; NaN distance fails
//! 3. cost: no cost data passes only when `cost_range.min == 0`, otherwise
//!    the cost must be within `cost_range`, inclusive
//! 4. `maximum_stay` absent or at least `duration_minimum`
//! 5. `free_only`: no cost data or zero cost
//! 6. `accessible_only`: disability device present
//! 7. never occupied
//! 8. first record per `bay_id`
//!
//! Output keeps source order.

use std::collections::HashSet;

use bays::{BayCollection, BayRecord};
use tracing::trace;

use crate::criteria::FilterCriteria;

/// A bay that passed the filter, with its distance to the reference location.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VisibleBay<'a> {
    pub bay: &'a BayRecord,
    pub distance_km: f64,
}

pub fn within_radius(distance_km: f64, criteria: &FilterCriteria) -> bool {
    criteria.radius_range.contains(distance_km)
}

pub fn cost_allows(bay: &BayRecord, criteria: &FilterCriteria) -> bool {
    match bay.cost_per_hour {
        None => criteria.cost_range.min == 0,
        Some(cents) => criteria.cost_range.contains(cents),
    }
}

pub fn duration_allows(bay: &BayRecord, criteria: &FilterCriteria) -> bool {
    bay.maximum_stay
        .is_none_or(|stay| stay >= criteria.duration_minimum)
}

/// Predicates 2 through 7 for a bay at a known distance.
pub fn admits(bay: &BayRecord, distance_km: f64, criteria: &FilterCriteria) -> bool {
    within_radius(distance_km, criteria)
        && cost_allows(bay, criteria)
        && duration_allows(bay, criteria)
        && (!criteria.free_only || bay.is_free())
        && (!criteria.accessible_only || bay.is_accessible())
        && !bay.is_occupied()
}

/// Filters `bays`, keeping source order and the first record per id.
pub fn filter_visible<'a, I>(bays: I, criteria: &FilterCriteria) -> Vec<VisibleBay<'a>>
where
    I: IntoIterator<Item = &'a BayRecord>,
{
    visible_positions(bays, criteria)
        .into_iter()
        .map(|(_, visible)| visible)
        .collect()
}

pub fn filter_bays<'a, I>(bays: I, criteria: &FilterCriteria) -> Vec<&'a BayRecord>
where
    I: IntoIterator<Item = &'a BayRecord>,
{
    filter_visible(bays, criteria)
        .into_iter()
        .map(|v| v.bay)
        .collect()
}

/// Positions in `collection` of the visible bays, ascending.
pub fn filter_indices(collection: &BayCollection, criteria: &FilterCriteria) -> Vec<usize> {
    visible_positions(collection, criteria)
        .into_iter()
        .map(|(i, _)| i)
        .collect()
}

/// Every predicate, with each survivor's position in `bays`.
fn visible_positions<'a, I>(bays: I, criteria: &FilterCriteria) -> Vec<(usize, VisibleBay<'a>)>
where
    I: IntoIterator<Item = &'a BayRecord>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    let mut total = 0usize;
    for (i, bay) in bays.into_iter().enumerate() {
        total += 1;
        let distance_km = bay.location().distance_km(criteria.reference_location);
        if !admits(bay, distance_km, criteria) {
            continue;
        }
        if !seen.insert(bay.bay_id.as_str()) {
            continue;
        }
        out.push((i, VisibleBay { bay, distance_km }));
    }
    trace!(total, visible = out.len(), "filtered bays");
    out
}
