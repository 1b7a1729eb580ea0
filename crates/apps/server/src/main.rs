mod api;
mod geocode;
mod sources;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use bays::fuse_payloads;
use formats::DatasetKind;
use foundation::math::GeoPoint;
use layers::criteria::DEFAULT_REFERENCE_LOCATION;
use layers::FilterCriteria;
use runtime::{ParkingController, DEFAULT_DURATION_STEP};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::geocode::{Geocoder, GeocoderConfig, DEFAULT_GEOCODER_URL};
use crate::sources::{SourceSet, SourceSpec, DEFAULT_OPEN_DATA_URL};

#[derive(Debug, Clone)]
struct ServerConfig {
    addr: SocketAddr,
    open_data_url: String,
    sources: Vec<(DatasetKind, SourceSpec)>,
    load_timeout: Duration,
    geocoder: GeocoderConfig,
    home: GeoPoint,
    duration_step: u32,
}

impl ServerConfig {
    fn from_env() -> Result<Self, String> {
        let addr = env::var("PARKING_ADDR").unwrap_or_else(|_| "127.0.0.1:9200".to_string());
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| format!("invalid PARKING_ADDR {addr:?}: {e}"))?;

        let sources = DatasetKind::ALL
            .into_iter()
            .map(|kind| {
                let spec = env::var(source_env_key(kind))
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| SourceSpec::parse(&v))
                    .unwrap_or_else(|| SourceSpec::default_for(kind));
                (kind, spec)
            })
            .collect();

        let defaults = GeocoderConfig::default();
        let geocoder = GeocoderConfig {
            url: env::var("PARKING_GEOCODER_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            country_codes: env::var("PARKING_GEOCODER_COUNTRY").unwrap_or(defaults.country_codes),
            user_agent: env::var("PARKING_GEOCODER_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout: Duration::from_secs(env_var_u64("PARKING_SEARCH_TIMEOUT_SECS", 10)),
        };

        Ok(Self {
            addr,
            open_data_url: env::var("PARKING_OPEN_DATA_URL")
                .unwrap_or_else(|_| DEFAULT_OPEN_DATA_URL.to_string()),
            sources,
            load_timeout: Duration::from_secs(env_var_u64("PARKING_LOAD_TIMEOUT_SECS", 60)),
            geocoder,
            home: GeoPoint::new(
                env_var_f64("PARKING_HOME_LAT", DEFAULT_REFERENCE_LOCATION.lat_deg),
                env_var_f64("PARKING_HOME_LON", DEFAULT_REFERENCE_LOCATION.lon_deg),
            ),
            duration_step: env_var_u32("PARKING_DURATION_STEP", DEFAULT_DURATION_STEP),
        })
    }
}

fn source_env_key(kind: DatasetKind) -> &'static str {
    match kind {
        DatasetKind::BayGeometry => "PARKING_SOURCE_BAYS",
        DatasetKind::Occupancy => "PARKING_SOURCE_OCCUPANCY",
        DatasetKind::Disability => "PARKING_SOURCE_DISABILITY",
        DatasetKind::ZoneSegments => "PARKING_SOURCE_ZONES",
        DatasetKind::ZoneCosts => "PARKING_SOURCE_COSTS",
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        error!("parking server failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = ServerConfig::from_env()?;
    let http = reqwest::Client::new();

    for (kind, spec) in &config.sources {
        info!(dataset = %kind, source = %spec, "configured source");
    }
    let sources = SourceSet::from_specs(
        &config.sources,
        &config.open_data_url,
        &http,
        config.load_timeout,
    )
    .map_err(|e| e.to_string())?;
    let payloads = sources.load_all().await.map_err(|e| e.to_string())?;
    let fused = fuse_payloads(&payloads).map_err(|e| e.to_string())?;
    info!(
        bays = fused.report.bays,
        occupied = fused.report.occupied,
        accessible = fused.report.accessible,
        priced = fused.report.priced,
        collapsed = fused.report.collapsed,
        "bay collection ready"
    );

    let criteria = FilterCriteria {
        reference_location: config.home,
        ..FilterCriteria::default()
    };
    let controller = ParkingController::new(Arc::new(fused.collection), criteria)
        .map_err(|e| format!("invalid home location: {e}"))?
        .with_duration_step(config.duration_step);
    let geocoder = Geocoder::new(config.geocoder.clone(), http);
    info!(url = %geocoder.config().url, "place search via geocoder");
    let state = AppState::new(controller, geocoder);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS]);

    let app = Router::new()
        .route("/healthz", get(api::healthz))
        .route("/bays/visible", get(api::get_visible))
        .route("/bays/select", get(api::select))
        .route("/bays/:bay_id", get(api::get_bay))
        .route("/criteria", get(api::get_criteria).put(api::put_criteria))
        .route("/criteria/duration/increment", post(api::increment_duration))
        .route("/criteria/duration/decrement", post(api::decrement_duration))
        .route("/location", post(api::post_location))
        .route("/search", post(api::post_search))
        .route("/radar", get(api::get_radar))
        .route("/events", get(api::events))
        .route("/metrics", get(api::get_metrics))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .map_err(|e| format!("cannot bind {}: {e}", config.addr))?;
    info!("parking server listening on http://{}", config.addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
