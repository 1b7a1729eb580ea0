//! Fetching the five raw bay datasets.
//!
//! Each slot is bound to a `DatasetSource`:
//! - a local file (`file:<path>` or a bare path)
//! - an open-data export (`remote:<dataset-name>`), fetched over HTTP
//!
//! All five are fetched concurrently. The first failure aborts the load and
//! names its dataset.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use formats::{DatasetKind, SourceLoadError, SourcePayloads, UnrecognisedDatasetError};
use tracing::{debug, info};

pub const DEFAULT_OPEN_DATA_URL: &str =
    "https://data.melbourne.vic.gov.au/api/explore/v2.1/catalog/datasets";

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Where one dataset comes from, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Remote(String),
    File(PathBuf),
}

impl SourceSpec {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(name) = raw.strip_prefix("remote:") {
            return SourceSpec::Remote(name.trim().to_string());
        }
        let path = raw.strip_prefix("file:").unwrap_or(raw);
        SourceSpec::File(PathBuf::from(path))
    }

    pub fn default_for(kind: DatasetKind) -> Self {
        SourceSpec::Remote(kind.remote_name().to_string())
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSpec::Remote(name) => write!(f, "remote:{name}"),
            SourceSpec::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// A single dataset slot that can produce raw bytes.
///
/// Implementations must be `Send + Sync` for use across async tasks.
pub trait DatasetSource: Send + Sync {
    fn kind(&self) -> DatasetKind;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, SourceLoadError>>;
}

pub struct FileSource {
    kind: DatasetKind,
    path: PathBuf,
}

impl FileSource {
    pub fn new(kind: DatasetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

impl DatasetSource for FileSource {
    fn kind(&self) -> DatasetKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, SourceLoadError>> {
        Box::pin(async move {
            tokio::fs::read(&self.path).await.map_err(|e| {
                SourceLoadError::with_source(
                    self.kind,
                    format!("cannot read {}", self.path.display()),
                    e,
                )
            })
        })
    }
}

/// Open-data portal export: `{base}/{dataset}/exports/{format}`.
pub struct OpenDataSource {
    kind: DatasetKind,
    url: String,
    client: reqwest::Client,
}

impl OpenDataSource {
    /// Fails when `dataset` is unknown or registered for another slot.
    pub fn new(
        kind: DatasetKind,
        dataset: &str,
        base_url: &str,
        client: reqwest::Client,
    ) -> Result<Self, UnrecognisedDatasetError> {
        let registered = DatasetKind::from_remote_name(dataset)?;
        if registered != kind {
            return Err(UnrecognisedDatasetError::wrong_slot(dataset, kind));
        }
        Ok(Self {
            kind,
            url: export_url(base_url, dataset, kind),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub fn export_url(base_url: &str, dataset: &str, kind: DatasetKind) -> String {
    format!(
        "{}/{}/exports/{}",
        base_url.trim_end_matches('/'),
        dataset,
        kind.remote_format().extension()
    )
}

impl DatasetSource for OpenDataSource {
    fn kind(&self) -> DatasetKind {
        self.kind
    }

    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, SourceLoadError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(|e| SourceLoadError::with_source(self.kind, "HTTP request failed", e))?;

            if !resp.status().is_success() {
                return Err(SourceLoadError::new(
                    self.kind,
                    format!("HTTP error: {}", resp.status()),
                ));
            }

            let bytes = resp.bytes().await.map_err(|e| {
                SourceLoadError::with_source(self.kind, "failed to read response", e)
            })?;
            Ok(bytes.to_vec())
        })
    }
}

/// The five configured slots.
pub struct SourceSet {
    sources: Vec<Arc<dyn DatasetSource>>,
    timeout: Duration,
}

impl SourceSet {
    /// Builds one source per slot from its spec. `specs` must yield a spec for
    /// every [`DatasetKind`].
    pub fn from_specs(
        specs: &[(DatasetKind, SourceSpec)],
        base_url: &str,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, SourceLoadError> {
        let mut sources: Vec<Arc<dyn DatasetSource>> = Vec::with_capacity(specs.len());
        for kind in DatasetKind::ALL {
            let Some((_, spec)) = specs.iter().find(|(k, _)| *k == kind) else {
                return Err(SourceLoadError::new(kind, "no source configured"));
            };
            let source: Arc<dyn DatasetSource> = match spec {
                SourceSpec::File(path) => Arc::new(FileSource::new(kind, path.clone())),
                SourceSpec::Remote(name) => Arc::new(
                    OpenDataSource::new(kind, name, base_url, client.clone())
                        .map_err(|e| SourceLoadError::with_source(kind, "bad dataset name", e))?,
                ),
            };
            sources.push(source);
        }
        Ok(Self { sources, timeout })
    }

    pub fn new(sources: Vec<Arc<dyn DatasetSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    fn get(&self, kind: DatasetKind) -> Result<&Arc<dyn DatasetSource>, SourceLoadError> {
        self.sources
            .iter()
            .find(|s| s.kind() == kind)
            .ok_or_else(|| SourceLoadError::new(kind, "no source configured"))
    }

    /// Fetches every slot concurrently; any failure or timeout aborts.
    pub async fn load_all(&self) -> Result<SourcePayloads, SourceLoadError> {
        let (bays, occupancy, disability, zones, costs) = tokio::try_join!(
            self.load(DatasetKind::BayGeometry),
            self.load(DatasetKind::Occupancy),
            self.load(DatasetKind::Disability),
            self.load(DatasetKind::ZoneSegments),
            self.load(DatasetKind::ZoneCosts),
        )?;
        Ok(SourcePayloads {
            bays,
            occupancy,
            disability,
            zones,
            costs,
        })
    }

    async fn load(&self, kind: DatasetKind) -> Result<Vec<u8>, SourceLoadError> {
        let source = self.get(kind)?;
        debug!(dataset = %kind, from = %source.describe(), "fetching source");
        let bytes = tokio::time::timeout(self.timeout, source.fetch())
            .await
            .map_err(|_| {
                SourceLoadError::new(kind, format!("timed out after {:?}", self.timeout))
            })??;
        info!(dataset = %kind, bytes = bytes.len(), "source loaded");
        Ok(bytes)
    }
}
