//! HTTP surface over the parking controller: the renderer reads the visible
//! set and the UI posts criteria changes.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use bays::{select_bay, BayDetails, BayRecord};
use foundation::math::GeoPoint;
use futures_util::stream::{self, Stream};
use layers::criteria::latlon::LatLon;
use layers::criteria::{CriteriaPatch, FilterCriteria, FilterInputError};
use layers::{radar_band, RadarRing};
use parking_lot::Mutex;
use runtime::{MetricsSnapshot, ParkingController, SearchOutcome, ViewChange};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::geocode::Geocoder;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Mutex<ParkingController>>,
    pub geocoder: Arc<Geocoder>,
    pub views: watch::Receiver<ViewSummary>,
}

impl AppState {
    /// Wires the controller's change notifications into a watch channel.
    pub fn new(mut controller: ParkingController, geocoder: Geocoder) -> Self {
        let (tx, rx) = watch::channel(ViewSummary::from(&controller.view()));
        controller.subscribe(move |change: &ViewChange| {
            tx.send_replace(ViewSummary::from(change));
        });
        Self {
            controller: Arc::new(Mutex::new(controller)),
            geocoder: Arc::new(geocoder),
            views: rx,
        }
    }
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

fn rejected(err: FilterInputError) -> (StatusCode, Json<Value>) {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

/// One line of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummary {
    pub revision: u64,
    pub visible: usize,
    pub reference_location: LatLon,
    pub radar: Vec<RadarRing>,
}

impl From<&ViewChange> for ViewSummary {
    fn from(change: &ViewChange) -> Self {
        Self {
            revision: change.revision,
            visible: change.visible_count(),
            reference_location: change.reference_location.into(),
            radar: change.radar.to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VisibleEntry<'a> {
    #[serde(flatten)]
    pub bay: &'a BayRecord,
    pub distance_km: f64,
    pub meter_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VisibleResponse<'a> {
    pub revision: u64,
    pub reference_location: LatLon,
    pub count: usize,
    pub bays: Vec<VisibleEntry<'a>>,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn get_visible(State(state): State<AppState>) -> Json<Value> {
    let controller = state.controller.lock();
    let here = controller.current_reference_location();
    let bays: Vec<VisibleEntry<'_>> = controller
        .current_visible_set()
        .into_iter()
        .map(|bay| VisibleEntry {
            bay,
            distance_km: bay.location().distance_km(here),
            meter_type: bay.meter_type(),
        })
        .collect();
    let body = VisibleResponse {
        revision: controller.revision(),
        reference_location: here.into(),
        count: bays.len(),
        bays,
    };
    Json(json!(body))
}

pub async fn get_bay(
    State(state): State<AppState>,
    AxumPath(bay_id): AxumPath<String>,
) -> ApiResult<BayDetails> {
    let controller = state.controller.lock();
    controller
        .bays()
        .get(&bay_id)
        .map(|bay| Json(BayDetails::from(bay)))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no bay {bay_id}")))
}

#[derive(Debug, Deserialize)]
pub struct SelectParams {
    pub lat: f64,
    pub lon: f64,
    /// Ignore clicks farther than this from every visible bay.
    pub max_km: Option<f64>,
}

pub async fn select(
    State(state): State<AppState>,
    Query(params): Query<SelectParams>,
) -> ApiResult<BayDetails> {
    let clicked = GeoPoint::new(params.lat, params.lon);
    if !clicked.is_valid() {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid coordinate"));
    }
    let controller = state.controller.lock();
    let visible = controller.current_visible_set();
    select_bay(visible.iter().copied(), clicked, params.max_km)
        .map(|bay| Json(BayDetails::from(bay)))
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no visible bay at that location"))
}

pub async fn get_criteria(State(state): State<AppState>) -> Json<FilterCriteria> {
    Json(state.controller.lock().criteria().clone())
}

pub async fn put_criteria(
    State(state): State<AppState>,
    Json(patch): Json<CriteriaPatch>,
) -> ApiResult<FilterCriteria> {
    let mut controller = state.controller.lock();
    controller.apply_criteria(&patch).map_err(rejected)?;
    Ok(Json(controller.criteria().clone()))
}

pub async fn increment_duration(State(state): State<AppState>) -> Json<Value> {
    let minutes = state.controller.lock().increment_duration();
    Json(json!({ "duration_minimum": minutes }))
}

pub async fn decrement_duration(State(state): State<AppState>) -> Json<Value> {
    let minutes = state.controller.lock().decrement_duration();
    Json(json!({ "duration_minimum": minutes }))
}

pub async fn post_location(
    State(state): State<AppState>,
    Json(location): Json<LatLon>,
) -> ApiResult<ViewSummary> {
    let mut controller = state.controller.lock();
    controller
        .set_reference_location(location.into())
        .map_err(rejected)?;
    Ok(Json(ViewSummary::from(&controller.view())))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

pub async fn post_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<Value> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query is required"));
    }

    let ticket = state.controller.lock().begin_place_search();
    let found = state.geocoder.lookup(query).await;

    let mut controller = state.controller.lock();
    let point = match found {
        Ok(Some(point)) => point,
        Ok(None) => {
            controller.cancel_place_search(ticket);
            return Err(api_error(StatusCode::NOT_FOUND, "no place matched"));
        }
        Err(err) => {
            controller.cancel_place_search(ticket);
            warn!(error = %err, query, "place search failed");
            let status = if err.timed_out {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            };
            return Err(api_error(status, err.to_string()));
        }
    };

    let outcome = controller
        .complete_place_search(ticket, point)
        .map_err(rejected)?;
    if outcome == SearchOutcome::Applied {
        info!(query, lat = point.lat_deg, lon = point.lon_deg, "reference moved by search");
    }
    Ok(Json(json!({
        "outcome": outcome.as_str(),
        "location": LatLon::from(point),
        "reference_location": LatLon::from(controller.current_reference_location()),
    })))
}

pub async fn get_radar(State(state): State<AppState>) -> Json<Value> {
    let controller = state.controller.lock();
    let max_km = controller.criteria().radius_range.max;
    Json(json!({
        "radius_max_km": max_km,
        "band": radar_band(max_km),
        "rings": controller.radar(),
    }))
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.controller.lock().metrics().snapshot())
}

/// Server-sent events: the current view first, then one per change.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold((state.views, true), |(mut rx, first)| async move {
        if !first {
            rx.changed().await.ok()?;
        }
        let summary = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("view")
            .id(summary.revision.to_string())
            .data(serde_json::to_string(&summary).unwrap_or_default());
        Some((Ok(event), (rx, false)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::{
        decrement_duration, get_bay, get_criteria, get_metrics, get_radar, get_visible,
        post_location, put_criteria, select, AppState, SelectParams,
    };
    use crate::geocode::{Geocoder, GeocoderConfig};
    use axum::extract::{Path as AxumPath, Query, State};
    use axum::http::StatusCode;
    use axum::Json;
    use bays::{BayCollection, BayRecord};
    use foundation::math::{km_to_lat_deg, GeoPoint};
    use layers::criteria::latlon::LatLon;
    use layers::criteria::{CriteriaPatch, FilterCriteria, Range};
    use runtime::ParkingController;
    use std::sync::Arc;

    const HOME: GeoPoint = GeoPoint::new(-37.8105, 144.9628);

    fn state() -> AppState {
        let north = |km: f64| GeoPoint::new(HOME.lat_deg + km_to_lat_deg(km), HOME.lon_deg);
        let near = BayRecord::new("near", north(0.2));
        let mut far = BayRecord::new("far", north(0.8));
        far.cost_per_hour = Some(300);
        far.pay_stay_zone = Some("Z".into());
        far.maximum_stay = Some(120);
        let bays = Arc::new(BayCollection::from_records(vec![near, far]));

        let criteria = FilterCriteria {
            radius_range: Range::new(0.0, 1.0),
            duration_minimum: 60,
            reference_location: HOME,
            ..FilterCriteria::default()
        };
        let controller = ParkingController::new(bays, criteria).expect("controller");
        AppState::new(
            controller,
            Geocoder::new(GeocoderConfig::default(), reqwest::Client::new()),
        )
    }

    #[tokio::test]
    async fn visible_set_lists_bays_with_distances() {
        let Json(body) = get_visible(State(state())).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["bays"][0]["bay_id"], "near");
        assert_eq!(body["bays"][1]["meter_type"], "2P");
        let d = body["bays"][0]["distance_km"].as_f64().expect("distance");
        assert!((d - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn bay_details_by_id() {
        let Json(details) = get_bay(State(state()), AxumPath("far".to_string()))
            .await
            .expect("bay");
        assert_eq!(details.meter_type, "2P");
        assert!(!details.free);

        let (status, _) = get_bay(State(state()), AxumPath("nope".to_string()))
            .await
            .err()
            .expect("missing bay");
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn select_resolves_the_nearest_visible_bay() {
        let params = SelectParams {
            lat: HOME.lat_deg + km_to_lat_deg(0.25),
            lon: HOME.lon_deg,
            max_km: Some(0.1),
        };
        let Json(details) = select(State(state()), Query(params)).await.expect("select");
        assert_eq!(details.bay_id, "near");

        let params = SelectParams {
            lat: 95.0,
            lon: 0.0,
            max_km: None,
        };
        let (status, _) = select(State(state()), Query(params))
            .await
            .err()
            .expect("bad coordinate");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn criteria_updates_apply_and_notify() {
        let state = state();
        let patch = CriteriaPatch {
            free_only: Some(true),
            ..Default::default()
        };
        let Json(criteria) = put_criteria(State(state.clone()), Json(patch))
            .await
            .expect("criteria");
        assert!(criteria.free_only);

        let Json(body) = get_visible(State(state.clone())).await;
        assert_eq!(body["count"], 1);
        assert_eq!(state.views.borrow().visible, 1);
        assert_eq!(state.views.borrow().revision, 1);

        let Json(current) = get_criteria(State(state)).await;
        assert!(current.free_only);
    }

    #[tokio::test]
    async fn invalid_criteria_are_unprocessable() {
        let state = state();
        let patch = CriteriaPatch {
            radius_range: Some(Range::new(0.9, 0.1)),
            ..Default::default()
        };
        let (status, Json(body)) = put_criteria(State(state.clone()), Json(patch))
            .await
            .err()
            .expect("rejected");
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap_or("").contains("radius_range"));

        let Json(metrics) = get_metrics(State(state)).await;
        assert_eq!(metrics.counters.get("criteria.rejected"), Some(&1));
    }

    #[tokio::test]
    async fn duration_never_drops_below_one() {
        let state = state();
        for _ in 0..10 {
            decrement_duration(State(state.clone())).await;
        }
        let Json(body) = decrement_duration(State(state)).await;
        assert_eq!(body["duration_minimum"], 1);
    }

    #[tokio::test]
    async fn location_moves_the_radar_centre() {
        let state = state();
        let Json(summary) = post_location(
            State(state.clone()),
            Json(LatLon {
                lat: -37.8,
                lon: 144.97,
            }),
        )
        .await
        .expect("location");
        assert_eq!(summary.reference_location, LatLon { lat: -37.8, lon: 144.97 });

        let Json(radar) = get_radar(State(state)).await;
        assert_eq!(radar["band"], 4);
        assert_eq!(radar["rings"][0]["radius_m"], 250);
    }
}
