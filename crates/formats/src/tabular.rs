//! Flat tabular sources: CSV with a header row, or JSON rows as exported by
//! the open-data portal.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::coerce::{
    CostUnit, json_text, normalize_key, optional_text, parse_dollars, parse_minutes,
};
use crate::dataset::SourceFormat;
use crate::records::{
    DisabilityRecord, OccupancyRecord, Parsed, ZoneCostRecord, ZoneSegmentRecord,
};

#[derive(Debug)]
pub enum TabularError {
    Csv(csv::Error),
    Json(serde_json::Error),
    NotRows(String),
    MissingColumn { column: &'static str },
    BadValue {
        row: usize,
        column: String,
        reason: String,
    },
}

impl std::fmt::Display for TabularError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabularError::Csv(e) => write!(f, "CSV error: {e}"),
            TabularError::Json(e) => write!(f, "JSON parse error: {e}"),
            TabularError::NotRows(reason) => write!(f, "expected a table of rows: {reason}"),
            TabularError::MissingColumn { column } => write!(f, "missing column: {column}"),
            TabularError::BadValue {
                row,
                column,
                reason,
            } => write!(f, "row {row}, column {column}: {reason}"),
        }
    }
}

impl std::error::Error for TabularError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TabularError::Csv(e) => Some(e),
            TabularError::Json(e) => Some(e),
            _ => None,
        }
    }
}

/// Rows of text cells keyed by lower-cased column name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Table {
    rows: Vec<HashMap<String, String>>,
    columns: Vec<String>,
}

impl Table {
    pub fn parse(bytes: &[u8], format: SourceFormat) -> Result<Self, TabularError> {
        match format {
            SourceFormat::Csv => Self::from_csv(bytes),
            SourceFormat::JsonRows | SourceFormat::GeoJson => Self::from_json_rows(bytes),
        }
    }

    /// Parses with the format sniffed from the payload.
    pub fn parse_sniffed(bytes: &[u8]) -> Result<Self, TabularError> {
        Self::parse(bytes, SourceFormat::sniff_tabular(bytes))
    }

    pub fn from_csv(bytes: &[u8]) -> Result<Self, TabularError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let columns: Vec<String> = rdr
            .headers()
            .map_err(TabularError::Csv)?
            .iter()
            .map(column_name)
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(TabularError::Csv)?;
            let mut row = HashMap::with_capacity(columns.len());
            for (col, cell) in columns.iter().zip(record.iter()) {
                row.insert(col.clone(), cell.to_string());
            }
            rows.push(row);
        }

        Ok(Self { rows, columns })
    }

    /// Accepts `[{..}, ..]` or `{"results": [{..}, ..]}`.
    pub fn from_json_rows(bytes: &[u8]) -> Result<Self, TabularError> {
        let value: Value = serde_json::from_slice(bytes).map_err(TabularError::Json)?;
        let items = match &value {
            Value::Array(items) => items,
            Value::Object(obj) => obj
                .get("results")
                .and_then(|v| v.as_array())
                .ok_or_else(|| TabularError::NotRows("object without a results array".into()))?,
            _ => return Err(TabularError::NotRows("expected an array".into())),
        };

        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let obj = item
                .as_object()
                .ok_or_else(|| {
                    TabularError::NotRows(format!("row {} is not an object", index + 1))
                })?;
            let mut row = HashMap::with_capacity(obj.len());
            for (k, v) in obj {
                let col = column_name(k);
                if !columns.contains(&col) {
                    columns.push(col.clone());
                }
                row.insert(col, json_text(v).unwrap_or_default());
            }
            rows.push(row);
        }

        Ok(Self { rows, columns })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// First of `aliases` that the table has.
    fn column(&self, aliases: &[&'static str]) -> Option<&'static str> {
        aliases
            .iter()
            .copied()
            .find(|a| self.columns.iter().any(|c| c == a))
    }

    fn require(&self, aliases: &[&'static str]) -> Result<&'static str, TabularError> {
        self.column(aliases)
            .ok_or(TabularError::MissingColumn { column: aliases[0] })
    }

    fn cell(&self, row: usize, column: Option<&str>) -> &str {
        column
            .and_then(|c| self.rows[row].get(c))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn column_name(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

const BAY_ID: &[&str] = &["bay_id", "bayid"];
const OCCUPIED_ID: &[&str] = &["occupied_id"];
const STATUS: &[&str] = &["status_description", "status"];
const SENSOR_ID: &[&str] = &["st_marker_id", "kerbsideid"];
const DISABILITY_DEVICE: &[&str] = &["disability_deviceid", "disability_device_id"];
const RD_SEG_ID: &[&str] = &["rd_seg_id", "road_segment_id", "street_segment_id"];
const PAY_STAY_ZONE: &[&str] = &["pay_stay_zone", "paystayzone", "zone_number"];
const STREET: &[&str] = &["street", "street_name", "onstreet", "rd_seg_dsc"];
const COST_CENTS: &[&str] = &["cost_per_hour"];
const COST_DOLLARS: &[&str] = &["cost_per_hour_dollars"];
const MAXIMUM_STAY: &[&str] = &["maximum_stay", "max_stay", "maximum_stay_minutes"];
const START_TIME: &[&str] = &["start_time", "starttime"];
const END_TIME: &[&str] = &["end_time", "endtime"];

/// Occupancy rows.
///
/// Uses `occupied_id` when present. Live sensor exports carry a status
/// column instead; `Present` marks the bay occupied and the sensor marker
/// (or the bay id) becomes the occupied id.
pub fn occupancy_records(table: &Table) -> Result<Parsed<OccupancyRecord>, TabularError> {
    let bay_col = table.require(BAY_ID)?;
    let occupied_col = table.column(OCCUPIED_ID);
    let status_col = table.column(STATUS);
    if occupied_col.is_none() && status_col.is_none() {
        return Err(TabularError::MissingColumn {
            column: OCCUPIED_ID[0],
        });
    }
    let sensor_col = table.column(SENSOR_ID);

    let mut out = Parsed::default();
    for row in 0..table.len() {
        let Some(bay_id) = normalize_key(table.cell(row, Some(bay_col))) else {
            out.skipped += 1;
            continue;
        };
        let occupied_id = match occupied_col {
            Some(col) => normalize_key(table.cell(row, Some(col))),
            None => {
                let status = table.cell(row, status_col).trim();
                if status.eq_ignore_ascii_case("present") {
                    normalize_key(table.cell(row, sensor_col)).or_else(|| Some(bay_id.clone()))
                } else {
                    None
                }
            }
        };
        out.rows.push(OccupancyRecord {
            bay_id,
            occupied_id,
        });
    }
    log_skipped("occupancy", out.skipped);
    Ok(out)
}

pub fn disability_records(table: &Table) -> Result<Parsed<DisabilityRecord>, TabularError> {
    let bay_col = table.require(BAY_ID)?;
    let device_col = table.require(DISABILITY_DEVICE)?;

    let mut out = Parsed::default();
    for row in 0..table.len() {
        let Some(bay_id) = normalize_key(table.cell(row, Some(bay_col))) else {
            out.skipped += 1;
            continue;
        };
        out.rows.push(DisabilityRecord {
            bay_id,
            disability_deviceid: normalize_key(table.cell(row, Some(device_col))),
        });
    }
    log_skipped("disability", out.skipped);
    Ok(out)
}

pub fn zone_segment_records(table: &Table) -> Result<Parsed<ZoneSegmentRecord>, TabularError> {
    let seg_col = table.require(RD_SEG_ID)?;
    let zone_col = table.require(PAY_STAY_ZONE)?;
    let street_col = table.column(STREET);

    let mut out = Parsed::default();
    for row in 0..table.len() {
        let Some(rd_seg_id) = normalize_key(table.cell(row, Some(seg_col))) else {
            out.skipped += 1;
            continue;
        };
        out.rows.push(ZoneSegmentRecord {
            rd_seg_id,
            pay_stay_zone: normalize_key(table.cell(row, Some(zone_col))),
            street: optional_text(table.cell(row, street_col)),
        });
    }
    log_skipped("zone segment", out.skipped);
    Ok(out)
}

pub fn zone_cost_records(table: &Table) -> Result<Parsed<ZoneCostRecord>, TabularError> {
    let zone_col = table.require(PAY_STAY_ZONE)?;
    let cents_col = table.column(COST_CENTS);
    let dollars_col = table.column(COST_DOLLARS);
    let cents_unit = cents_col.map(|col| {
        CostUnit::sniff((0..table.len()).map(|row| table.cell(row, Some(col))))
    });
    let stay_col = table.column(MAXIMUM_STAY);
    let start_col = table.column(START_TIME);
    let end_col = table.column(END_TIME);

    let mut out = Parsed::default();
    for row in 0..table.len() {
        let Some(pay_stay_zone) = normalize_key(table.cell(row, Some(zone_col))) else {
            out.skipped += 1;
            continue;
        };

        let cost_per_hour = match (cents_col.zip(cents_unit), dollars_col) {
            (Some((col, unit)), _) => unit.parse(table.cell(row, Some(col))),
            (None, Some(col)) => parse_dollars(table.cell(row, Some(col))),
            (None, None) => Ok(None),
        }
        .map_err(|reason| bad_value(row, cents_col.or(dollars_col), reason))?;

        let maximum_stay = parse_minutes(table.cell(row, stay_col))
            .map_err(|reason| bad_value(row, stay_col, reason))?;

        out.rows.push(ZoneCostRecord {
            pay_stay_zone,
            cost_per_hour,
            maximum_stay,
            start_time: optional_text(table.cell(row, start_col)),
            end_time: optional_text(table.cell(row, end_col)),
        });
    }
    log_skipped("zone cost", out.skipped);
    Ok(out)
}

fn bad_value(row: usize, column: Option<&str>, reason: String) -> TabularError {
    TabularError::BadValue {
        row: row + 1,
        column: column.unwrap_or("?").to_string(),
        reason,
    }
}

fn log_skipped(what: &str, skipped: usize) {
    if skipped > 0 {
        warn!(skipped, "{what} rows without a join key skipped");
    }
}
