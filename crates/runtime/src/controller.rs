use std::sync::Arc;

use bays::{BayCollection, BayRecord};
use foundation::math::GeoPoint;
use layers::criteria::{self, CriteriaPatch, FilterCriteria, FilterInputError, Range};
use layers::{RadarRing, filter_indices, radar_rings};
use tracing::{debug, warn};

use crate::metrics::{self, Metrics};
use crate::observers::{Observers, SubscriptionId, ViewChange};
use crate::search::{SearchOutcome, SearchSequencer, SearchTicket};

/// Minutes added or removed per duration step.
pub const DEFAULT_DURATION_STEP: u32 = 15;

/// Owns the live criteria and the visible set derived from them.
///
/// Every accepted mutation re-runs the filter over the whole collection exactly
/// once. Rejected input changes nothing and does not re-run it. Listeners hear
/// about a recompute only when the visible set or the reference location moved.
#[derive(Debug)]
pub struct ParkingController {
    bays: Arc<BayCollection>,
    criteria: FilterCriteria,
    visible: Arc<[usize]>,
    revision: u64,
    duration_step: u32,
    observers: Observers,
    searches: SearchSequencer,
    metrics: Metrics,
}

impl ParkingController {
    pub fn new(
        bays: Arc<BayCollection>,
        criteria: FilterCriteria,
    ) -> Result<Self, FilterInputError> {
        criteria.validate()?;
        let mut counters = Metrics::new();
        counters.set_gauge(metrics::BAYS_TOTAL, gauge_value(bays.len()));
        let mut this = Self {
            bays,
            criteria,
            visible: Arc::from(Vec::new()),
            revision: 0,
            duration_step: DEFAULT_DURATION_STEP,
            observers: Observers::new(),
            searches: SearchSequencer::new(),
            metrics: counters,
        };
        this.visible = this.compute();
        Ok(this)
    }

    /// Step for `increment_duration` / `decrement_duration`, at least one minute.
    pub fn with_duration_step(mut self, minutes: u32) -> Self {
        self.duration_step = minutes.max(1);
        self
    }

    pub fn bays(&self) -> &Arc<BayCollection> {
        &self.bays
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn duration_step(&self) -> u32 {
        self.duration_step
    }

    /// Radius range as currently applied, after clamping.
    pub fn radius_range(&self) -> Range<f64> {
        self.criteria.radius_range
    }

    pub fn current_visible_set(&self) -> Vec<&BayRecord> {
        self.visible
            .iter()
            .filter_map(|&i| self.bays.get_index(i))
            .collect()
    }

    pub fn is_visible(&self, bay_id: &str) -> bool {
        self.bays
            .position(bay_id)
            .is_some_and(|i| self.visible.binary_search(&i).is_ok())
    }

    pub fn current_reference_location(&self) -> GeoPoint {
        self.criteria.reference_location
    }

    pub fn radar(&self) -> &'static [RadarRing] {
        radar_rings(self.criteria.radius_range.max)
    }

    pub fn view(&self) -> ViewChange {
        ViewChange::new(
            self.revision,
            self.criteria.reference_location,
            self.radar(),
            Arc::clone(&self.bays),
            Arc::clone(&self.visible),
        )
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&ViewChange) + Send + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn set_free_only(&mut self, free_only: bool) {
        let mut next = self.criteria.clone();
        next.free_only = free_only;
        self.commit(next);
    }

    pub fn set_accessible_only(&mut self, accessible_only: bool) {
        let mut next = self.criteria.clone();
        next.accessible_only = accessible_only;
        self.commit(next);
    }

    /// Kilometers; clamped into `[0, 1]`.
    pub fn set_radius_range(&mut self, min_km: f64, max_km: f64) -> Result<(), FilterInputError> {
        let range = self.checked(criteria::radius_range(min_km, max_km))?;
        let mut next = self.criteria.clone();
        next.radius_range = range;
        self.commit(next);
        Ok(())
    }

    /// Cents per hour.
    pub fn set_cost_range(&mut self, min: f64, max: f64) -> Result<(), FilterInputError> {
        let range = self.checked(criteria::cost_range(min, max))?;
        let mut next = self.criteria.clone();
        next.cost_range = range;
        self.commit(next);
        Ok(())
    }

    pub fn set_duration_minimum(&mut self, minutes: i64) -> Result<(), FilterInputError> {
        let minutes = self.checked(criteria::duration_minimum(minutes))?;
        let mut next = self.criteria.clone();
        next.duration_minimum = minutes;
        self.commit(next);
        Ok(())
    }

    /// Returns the new minimum.
    pub fn increment_duration(&mut self) -> u32 {
        let minutes = self
            .criteria
            .duration_minimum
            .saturating_add(self.duration_step);
        self.step_duration(minutes)
    }

    /// Returns the new minimum, never below one minute.
    pub fn decrement_duration(&mut self) -> u32 {
        let minutes = self
            .criteria
            .duration_minimum
            .saturating_sub(self.duration_step)
            .max(1);
        self.step_duration(minutes)
    }

    /// Device geolocation. Outstanding place searches become stale.
    pub fn set_reference_location(&mut self, point: GeoPoint) -> Result<(), FilterInputError> {
        let point = self.checked(criteria::reference_location(point))?;
        self.searches.supersede_all();
        self.move_to(point);
        Ok(())
    }

    pub fn begin_place_search(&mut self) -> SearchTicket {
        self.searches.begin()
    }

    /// Applies a geocoded search result unless a newer search or a direct
    /// location update has happened since `ticket` was issued.
    pub fn complete_place_search(
        &mut self,
        ticket: SearchTicket,
        point: GeoPoint,
    ) -> Result<SearchOutcome, FilterInputError> {
        if !self.searches.is_current(ticket) {
            self.metrics.incr(metrics::SEARCH_SUPERSEDED);
            debug!(ticket = ticket.sequence(), "stale place search dropped");
            return Ok(SearchOutcome::Superseded);
        }
        let point = self.checked(criteria::reference_location(point))?;
        self.searches.complete(ticket);
        self.move_to(point);
        Ok(SearchOutcome::Applied)
    }

    /// Abandons `ticket` without moving, e.g. after a failed geocode.
    pub fn cancel_place_search(&mut self, ticket: SearchTicket) {
        self.searches.complete(ticket);
    }

    /// Validated batch update. All fields apply together or none do.
    pub fn apply_criteria(&mut self, patch: &CriteriaPatch) -> Result<(), FilterInputError> {
        let next = self.checked(self.criteria.patched(patch))?;
        if patch.reference_location.is_some() {
            self.searches.supersede_all();
        }
        self.commit(next);
        Ok(())
    }

    fn step_duration(&mut self, minutes: u32) -> u32 {
        let mut next = self.criteria.clone();
        next.duration_minimum = minutes;
        self.commit(next);
        minutes
    }

    fn move_to(&mut self, point: GeoPoint) {
        let mut next = self.criteria.clone();
        next.reference_location = point;
        self.commit(next);
    }

    fn checked<T>(&mut self, input: Result<T, FilterInputError>) -> Result<T, FilterInputError> {
        input.inspect_err(|e| {
            self.metrics.incr(metrics::CRITERIA_REJECTED);
            warn!(error = %e, "criteria update rejected");
        })
    }

    fn commit(&mut self, next: FilterCriteria) {
        let moved = next.reference_location != self.criteria.reference_location;
        let rings_changed = radar_rings(next.radius_range.max).len() != self.radar().len();
        self.criteria = next;

        let visible = self.compute();
        let changed = visible != self.visible;
        self.visible = visible;

        if changed || moved || rings_changed {
            self.revision += 1;
            self.metrics.incr(metrics::VIEW_NOTIFICATIONS);
            let change = self.view();
            self.observers.notify(&change);
        }
    }

    fn compute(&mut self) -> Arc<[usize]> {
        let visible = filter_indices(&self.bays, &self.criteria);
        let count = gauge_value(visible.len());
        self.metrics.incr(metrics::FILTER_RECOMPUTES);
        self.metrics.set_gauge(metrics::BAYS_VISIBLE, count);
        self.metrics.observe(metrics::FILTER_VISIBLE, count);
        debug!(
            visible = visible.len(),
            total = self.bays.len(),
            radius_max_km = self.criteria.radius_range.max,
            "recomputed visible bays"
        );
        Arc::from(visible)
    }
}

fn gauge_value(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
