//! Free-text place search against a Nominatim-compatible geocoder.

use std::time::Duration;

use foundation::math::GeoPoint;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";

#[derive(Debug)]
pub struct GeocodeError {
    pub message: String,
    pub timed_out: bool,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for GeocodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GeocodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl GeocodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
            source: Some(Box::new(source)),
        }
    }

    fn timeout(after: Duration) -> Self {
        Self {
            message: format!("geocoder timed out after {after:?}"),
            timed_out: true,
            source: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    /// ISO 3166-1 alpha-2 codes, comma separated. Empty means worldwide.
    pub country_codes: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GEOCODER_URL.to_string(),
            country_codes: "au".to_string(),
            user_agent: concat!("parking_server/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct Geocoder {
    config: GeocoderConfig,
    client: reqwest::Client,
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

impl Geocoder {
    pub fn new(config: GeocoderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }

    pub fn search_url(&self, query: &str) -> Result<reqwest::Url, GeocodeError> {
        let mut params = vec![("q", query), ("format", "jsonv2"), ("limit", "1")];
        if !self.config.country_codes.is_empty() {
            params.push(("countrycodes", self.config.country_codes.as_str()));
        }
        reqwest::Url::parse_with_params(&self.config.url, &params)
            .map_err(|e| GeocodeError::with_source("invalid geocoder URL", e))
    }

    /// Best match for `query`, `None` when nothing matched.
    pub async fn lookup(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let url = self.search_url(query)?;
        let request = async {
            let resp = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, &self.config.user_agent)
                .send()
                .await
                .map_err(|e| GeocodeError::with_source("geocoder request failed", e))?;
            if !resp.status().is_success() {
                return Err(GeocodeError::new(format!(
                    "geocoder HTTP error: {}",
                    resp.status()
                )));
            }
            resp.bytes()
                .await
                .map_err(|e| GeocodeError::with_source("failed to read geocoder response", e))
        };

        let body = tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| GeocodeError::timeout(self.config.timeout))??;
        let found = parse_places(&body)?;
        debug!(query, found = found.is_some(), "geocoded place");
        Ok(found)
    }
}

pub fn parse_places(body: &[u8]) -> Result<Option<GeoPoint>, GeocodeError> {
    let places: Vec<Place> = serde_json::from_slice(body)
        .map_err(|e| GeocodeError::with_source("unexpected geocoder response", e))?;
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let lat = place.lat.trim().parse::<f64>();
    let lon = place.lon.trim().parse::<f64>();
    match (lat, lon) {
        (Ok(lat), Ok(lon)) => Ok(Some(GeoPoint::new(lat, lon))),
        _ => Err(GeocodeError::new(format!(
            "geocoder returned a non-numeric coordinate: ({}, {})",
            place.lat, place.lon
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_places, Geocoder, GeocoderConfig};
    use foundation::math::GeoPoint;

    #[test]
    fn parses_first_match() {
        let body = br#"[
            {"lat": "-37.8136", "lon": "144.9631", "display_name": "Melbourne"},
            {"lat": "-33.8688", "lon": "151.2093", "display_name": "Sydney"}
        ]"#;
        assert_eq!(
            parse_places(body).expect("places"),
            Some(GeoPoint::new(-37.8136, 144.9631))
        );
    }

    #[test]
    fn empty_result_is_not_an_error() {
        assert_eq!(parse_places(b"[]").expect("places"), None);
    }

    #[test]
    fn malformed_results_are_errors() {
        assert!(parse_places(b"{}").is_err());
        assert!(parse_places(br#"[{"lat": "north", "lon": "1"}]"#).is_err());
    }

    #[test]
    fn search_url_carries_query_and_country() {
        let geocoder = Geocoder::new(GeocoderConfig::default(), reqwest::Client::new());
        let url = geocoder.search_url("Flinders St Station").expect("url");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("q".into(), "Flinders St Station".into())));
        assert!(pairs.contains(&("countrycodes".into(), "au".into())));
        assert!(pairs.contains(&("limit".into(), "1".into())));

        let worldwide = Geocoder::new(
            GeocoderConfig {
                country_codes: String::new(),
                ..GeocoderConfig::default()
            },
            reqwest::Client::new(),
        );
        let url = worldwide.search_url("Paris").expect("url");
        assert!(!url.as_str().contains("countrycodes"));
    }
}
