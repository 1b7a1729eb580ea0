use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::dataset::{DatasetKind, SourceLoadError};
use crate::geojson::parse_bay_geometries;
use crate::records::{
    BayGeometry, DisabilityRecord, OccupancyRecord, ZoneCostRecord, ZoneSegmentRecord,
};
use crate::tabular::{
    Table, disability_records, occupancy_records, zone_cost_records, zone_segment_records,
};

/// Raw bytes of the five sources, however they were fetched.
#[derive(Debug, Default, Clone)]
pub struct SourcePayloads {
    pub bays: Vec<u8>,
    pub occupancy: Vec<u8>,
    pub disability: Vec<u8>,
    pub zones: Vec<u8>,
    pub costs: Vec<u8>,
}

impl SourcePayloads {
    pub fn get(&self, kind: DatasetKind) -> &[u8] {
        match kind {
            DatasetKind::BayGeometry => &self.bays,
            DatasetKind::Occupancy => &self.occupancy,
            DatasetKind::Disability => &self.disability,
            DatasetKind::ZoneSegments => &self.zones,
            DatasetKind::ZoneCosts => &self.costs,
        }
    }

    pub fn set(&mut self, kind: DatasetKind, bytes: Vec<u8>) {
        let slot = match kind {
            DatasetKind::BayGeometry => &mut self.bays,
            DatasetKind::Occupancy => &mut self.occupancy,
            DatasetKind::Disability => &mut self.disability,
            DatasetKind::ZoneSegments => &mut self.zones,
            DatasetKind::ZoneCosts => &mut self.costs,
        };
        *slot = bytes;
    }

    /// Reads all five sources from local files. Stops at the first failure.
    pub fn read_paths(paths: &SourcePaths) -> Result<Self, SourceLoadError> {
        let mut out = Self::default();
        for kind in DatasetKind::ALL {
            out.set(kind, read_file(kind, paths.get(kind))?);
        }
        Ok(out)
    }
}

/// Local file locations of the five sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub bays: PathBuf,
    pub occupancy: PathBuf,
    pub disability: PathBuf,
    pub zones: PathBuf,
    pub costs: PathBuf,
}

impl SourcePaths {
    pub fn get(&self, kind: DatasetKind) -> &Path {
        match kind {
            DatasetKind::BayGeometry => &self.bays,
            DatasetKind::Occupancy => &self.occupancy,
            DatasetKind::Disability => &self.disability,
            DatasetKind::ZoneSegments => &self.zones,
            DatasetKind::ZoneCosts => &self.costs,
        }
    }
}

fn read_file(kind: DatasetKind, path: &Path) -> Result<Vec<u8>, SourceLoadError> {
    std::fs::read(path).map_err(|e| {
        SourceLoadError::with_source(kind, format!("cannot read {}", path.display()), e)
    })
}

/// The five normalized sources, ready for fusion.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceTables {
    pub bays: Vec<BayGeometry>,
    pub occupancy: Vec<OccupancyRecord>,
    pub disability: Vec<DisabilityRecord>,
    pub zones: Vec<ZoneSegmentRecord>,
    pub costs: Vec<ZoneCostRecord>,
    /// Rows dropped for a missing join key, per source.
    pub skipped: BTreeMap<DatasetKind, usize>,
}

impl SourceTables {
    /// Parses every payload; the first failing source aborts with its name.
    pub fn parse(payloads: &SourcePayloads) -> Result<Self, SourceLoadError> {
        let mut out = Self::default();

        let bays = parse_bay_geometries(&payloads.bays).map_err(|e| {
            SourceLoadError::with_source(DatasetKind::BayGeometry, "invalid GeoJSON", e)
        })?;
        out.bays = bays.rows;
        out.skipped.insert(DatasetKind::BayGeometry, bays.skipped);

        let occupancy = occupancy_records(&table(DatasetKind::Occupancy, &payloads.occupancy)?)
            .map_err(|e| invalid_rows(DatasetKind::Occupancy, e))?;
        out.occupancy = occupancy.rows;
        out.skipped.insert(DatasetKind::Occupancy, occupancy.skipped);

        let disability =
            disability_records(&table(DatasetKind::Disability, &payloads.disability)?)
                .map_err(|e| invalid_rows(DatasetKind::Disability, e))?;
        out.disability = disability.rows;
        out.skipped.insert(DatasetKind::Disability, disability.skipped);

        let zones = zone_segment_records(&table(DatasetKind::ZoneSegments, &payloads.zones)?)
            .map_err(|e| invalid_rows(DatasetKind::ZoneSegments, e))?;
        out.zones = zones.rows;
        out.skipped.insert(DatasetKind::ZoneSegments, zones.skipped);

        let costs = zone_cost_records(&table(DatasetKind::ZoneCosts, &payloads.costs)?)
            .map_err(|e| invalid_rows(DatasetKind::ZoneCosts, e))?;
        out.costs = costs.rows;
        out.skipped.insert(DatasetKind::ZoneCosts, costs.skipped);

        debug!(
            bays = out.bays.len(),
            occupancy = out.occupancy.len(),
            disability = out.disability.len(),
            zones = out.zones.len(),
            costs = out.costs.len(),
            "parsed sources"
        );
        Ok(out)
    }

    pub fn skipped(&self, kind: DatasetKind) -> usize {
        self.skipped.get(&kind).copied().unwrap_or(0)
    }
}

fn table(kind: DatasetKind, bytes: &[u8]) -> Result<Table, SourceLoadError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(SourceLoadError::new(kind, "empty payload"));
    }
    Table::parse_sniffed(bytes).map_err(|e| invalid_rows(kind, e))
}

fn invalid_rows(kind: DatasetKind, e: crate::tabular::TabularError) -> SourceLoadError {
    SourceLoadError::with_source(kind, "invalid rows", e)
}
