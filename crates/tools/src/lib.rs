//! Offline helpers behind the `parkbay` binary: fuse the five raw sources into
//! a bay collection file, then query that file with filter criteria.

use std::fs;
use std::io::Write;
use std::path::Path;

use bays::{BayCollection, Fused, fuse_payloads};
use formats::{SourceLoadError, SourcePaths, SourcePayloads};
use layers::{CriteriaPatch, FilterCriteria, FilterInputError, filter_visible};
use serde::Serialize;

pub fn fuse_files(paths: &SourcePaths) -> Result<Fused, SourceLoadError> {
    let payloads = SourcePayloads::read_paths(paths)?;
    fuse_payloads(&payloads)
}

/// Pretty JSON to `out`, or stdout when `out` is `None`.
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<(), String> {
    let mut json = serde_json::to_vec_pretty(value).map_err(|e| e.to_string())?;
    json.push(b'\n');
    match out {
        Some(path) => fs::write(path, json).map_err(|e| format!("write {}: {e}", path.display())),
        None => std::io::stdout()
            .lock()
            .write_all(&json)
            .map_err(|e| e.to_string()),
    }
}

pub fn read_collection(path: &Path) -> Result<BayCollection, String> {
    let bytes = fs::read(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("parse {}: {e}", path.display()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRow<'a> {
    pub bay_id: &'a str,
    pub distance_km: f64,
    pub meter_type: &'static str,
    pub free: bool,
    pub accessible: bool,
    pub cost_per_hour: Option<u32>,
    pub maximum_stay: Option<u32>,
    pub street: Option<&'a str>,
}

/// Visible bays for the default criteria with `patch` applied.
pub fn query<'a>(
    collection: &'a BayCollection,
    patch: &CriteriaPatch,
) -> Result<Vec<QueryRow<'a>>, FilterInputError> {
    let criteria = FilterCriteria::default().patched(patch)?;
    Ok(filter_visible(collection, &criteria)
        .into_iter()
        .map(|v| QueryRow {
            bay_id: &v.bay.bay_id,
            distance_km: v.distance_km,
            meter_type: v.bay.meter_type(),
            free: v.bay.is_free(),
            accessible: v.bay.is_accessible(),
            cost_per_hour: v.bay.cost_per_hour,
            maximum_stay: v.bay.maximum_stay,
            street: v.bay.street.as_deref(),
        })
        .collect())
}
