//! Joins the five normalized sources into one bay collection.
//!
//! Bay geometry is the universe of bays. Every other source is left-joined
//! in a fixed order:
//!
//! 1. occupancy on `bay_id`
//! 2. disability restrictions on `bay_id`
//! 3. pay-stay zone segments on `rd_seg_id`
//! 4. pay-stay costs on `pay_stay_zone`
//!
//! A key that matches several right-hand rows fans the bay out into several
//! rows; the fanned-out rows are then collapsed by `bay_id`, keeping the first
//! row in join order.

use std::collections::HashMap;

use formats::{SourceLoadError, SourcePayloads, SourceTables};
use serde::Serialize;
use tracing::debug;

use crate::collection::BayCollection;
use crate::record::BayRecord;

/// Counts describing one fusion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FusionReport {
    /// Bays in the fused collection.
    pub bays: usize,
    /// Rows produced by the joins before collapsing duplicates.
    pub joined_rows: usize,
    /// Rows dropped while collapsing fan-out duplicates.
    pub collapsed: usize,
    pub occupied: usize,
    pub accessible: usize,
    /// Bays with a cost entry (zero included).
    pub priced: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fused {
    pub collection: BayCollection,
    pub report: FusionReport,
}

/// Parses the raw payloads and fuses them. Any source failure aborts.
pub fn fuse_payloads(payloads: &SourcePayloads) -> Result<Fused, SourceLoadError> {
    let tables = SourceTables::parse(payloads)?;
    Ok(fuse(&tables))
}

pub fn fuse(tables: &SourceTables) -> Fused {
    let occupancy = index_by(&tables.occupancy, |r| r.bay_id.as_str());
    let disability = index_by(&tables.disability, |r| r.bay_id.as_str());
    let zones = index_by(&tables.zones, |r| r.rd_seg_id.as_str());
    let costs = index_by(&tables.costs, |r| r.pay_stay_zone.as_str());

    let mut collection = BayCollection::new();
    let mut report = FusionReport::default();

    for geom in &tables.bays {
        let mut base = BayRecord::new(geom.bay_id.clone(), geom.centroid);
        base.rd_seg_id = geom.rd_seg_id.clone();
        base.street = geom.street.clone();

        let rows = vec![base];
        let rows = left_join(rows, &occupancy, |b| Some(&b.bay_id), |b, r| {
            b.occupied_id = r.occupied_id.clone();
        });
        let rows = left_join(rows, &disability, |b| Some(&b.bay_id), |b, r| {
            b.disability_deviceid = r.disability_deviceid.clone();
        });
        let rows = left_join(rows, &zones, |b| b.rd_seg_id.as_ref(), |b, r| {
            b.pay_stay_zone = r.pay_stay_zone.clone();
            if b.street.is_none() {
                b.street = r.street.clone();
            }
        });
        let rows = left_join(rows, &costs, |b| b.pay_stay_zone.as_ref(), |b, r| {
            b.cost_per_hour = r.cost_per_hour;
            b.maximum_stay = r.maximum_stay;
            b.start_time = r.start_time.clone();
            b.end_time = r.end_time.clone();
        });

        report.joined_rows += rows.len();
        for row in rows {
            if !collection.insert(row) {
                report.collapsed += 1;
            }
        }
    }

    report.bays = collection.len();
    for bay in &collection {
        report.occupied += usize::from(bay.is_occupied());
        report.accessible += usize::from(bay.is_accessible());
        report.priced += usize::from(bay.cost_per_hour.is_some());
    }

    debug!(
        bays = report.bays,
        joined_rows = report.joined_rows,
        collapsed = report.collapsed,
        "fused bay collection"
    );

    Fused { collection, report }
}

/// Right-hand rows grouped by key, each group in source order.
fn index_by<'a, T>(rows: &'a [T], key: impl Fn(&'a T) -> &'a str) -> HashMap<&'a str, Vec<&'a T>> {
    let mut out: HashMap<&str, Vec<&T>> = HashMap::with_capacity(rows.len());
    for row in rows {
        out.entry(key(row)).or_default().push(row);
    }
    out
}

/// Left join: unmatched rows pass through unchanged, matched rows are
/// repeated once per right-hand match.
fn left_join<T>(
    rows: Vec<BayRecord>,
    right: &HashMap<&str, Vec<&T>>,
    key: impl Fn(&BayRecord) -> Option<&String>,
    apply: impl Fn(&mut BayRecord, &T),
) -> Vec<BayRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let matches = key(&row).and_then(|k| right.get(k.as_str()));
        match matches {
            None => out.push(row),
            Some(matches) => {
                for m in matches {
                    let mut joined = row.clone();
                    apply(&mut joined, m);
                    out.push(joined);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{fuse, fuse_payloads};
    use formats::{
        BayGeometry, DatasetKind, DisabilityRecord, OccupancyRecord, SourcePayloads,
        SourceTables, ZoneCostRecord, ZoneSegmentRecord,
    };
    use foundation::math::GeoPoint;
    use pretty_assertions::assert_eq;

    fn geom(id: &str, seg: Option<&str>) -> BayGeometry {
        BayGeometry {
            bay_id: id.to_string(),
            rd_seg_id: seg.map(str::to_string),
            street: None,
            centroid: GeoPoint::new(-37.81, 144.96),
        }
    }

    fn zone(seg: &str, zone: Option<&str>, street: Option<&str>) -> ZoneSegmentRecord {
        ZoneSegmentRecord {
            rd_seg_id: seg.to_string(),
            pay_stay_zone: zone.map(str::to_string),
            street: street.map(str::to_string),
        }
    }

    fn cost(zone: &str, cents: Option<u32>, stay: Option<u32>) -> ZoneCostRecord {
        ZoneCostRecord {
            pay_stay_zone: zone.to_string(),
            cost_per_hour: cents,
            maximum_stay: stay,
            start_time: Some("07:30".to_string()),
            end_time: Some("18:30".to_string()),
        }
    }

    fn sample() -> SourceTables {
        SourceTables {
            bays: vec![
                geom("1", Some("S1")),
                geom("2", Some("S2")),
                geom("3", None),
                geom("4", Some("S-unknown")),
            ],
            occupancy: vec![
                OccupancyRecord {
                    bay_id: "1".into(),
                    occupied_id: Some("occ-1".into()),
                },
                OccupancyRecord {
                    bay_id: "99".into(),
                    occupied_id: Some("orphan".into()),
                },
            ],
            disability: vec![DisabilityRecord {
                bay_id: "2".into(),
                disability_deviceid: Some("D2".into()),
            }],
            zones: vec![
                zone("S1", Some("Z1"), Some("Collins Street")),
                zone("S2", Some("Z-nocost"), None),
            ],
            costs: vec![cost("Z1", Some(200), Some(120))],
            ..Default::default()
        }
    }

    #[test]
    fn every_geometry_bay_appears_exactly_once() {
        let fused = fuse(&sample());
        let ids: Vec<&str> = fused.collection.iter().map(|b| b.bay_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert!(fused.collection.get("99").is_none());
    }

    #[test]
    fn joins_attach_optional_fields() {
        let fused = fuse(&sample());
        let c = &fused.collection;

        let b1 = c.get("1").expect("bay 1");
        assert_eq!(b1.occupied_id.as_deref(), Some("occ-1"));
        assert_eq!(b1.pay_stay_zone.as_deref(), Some("Z1"));
        assert_eq!(b1.cost_per_hour, Some(200));
        assert_eq!(b1.maximum_stay, Some(120));
        assert_eq!(b1.street.as_deref(), Some("Collins Street"));
        assert_eq!(b1.start_time.as_deref(), Some("07:30"));

        let b2 = c.get("2").expect("bay 2");
        assert_eq!(b2.disability_deviceid.as_deref(), Some("D2"));
        assert_eq!(b2.pay_stay_zone.as_deref(), Some("Z-nocost"));
        assert_eq!(b2.cost_per_hour, None);

        let b3 = c.get("3").expect("bay 3");
        assert_eq!(b3.occupied_id, None);
        assert_eq!(b3.pay_stay_zone, None);
    }

    #[test]
    fn zone_derived_fields_present_only_with_a_zone() {
        let fused = fuse(&sample());
        for bay in &fused.collection {
            if bay.pay_stay_zone.is_none() {
                assert_eq!(bay.cost_per_hour, None, "bay {}", bay.bay_id);
                assert_eq!(bay.maximum_stay, None, "bay {}", bay.bay_id);
            }
        }
    }

    #[test]
    fn fan_out_collapses_to_first_match() {
        let mut tables = sample();
        tables.zones.push(zone("S1", Some("Z2"), None));
        tables.costs.push(cost("Z1", Some(500), Some(60)));
        tables.costs.push(cost("Z2", Some(900), Some(30)));
        tables.occupancy.push(OccupancyRecord {
            bay_id: "1".into(),
            occupied_id: None,
        });

        let fused = fuse(&tables);
        let b1 = fused.collection.get("1").expect("bay 1");
        assert_eq!(b1.occupied_id.as_deref(), Some("occ-1"));
        assert_eq!(b1.pay_stay_zone.as_deref(), Some("Z1"));
        assert_eq!(b1.cost_per_hour, Some(200));
        assert_eq!(b1.maximum_stay, Some(120));

        // Bay 1 fans out to 2 occupancy x (Z1: 2 costs + Z2: 1 cost) = 6 rows.
        assert_eq!(fused.report.joined_rows, 6 + 3);
        assert_eq!(fused.report.collapsed, 5);
        assert_eq!(fused.report.bays, 4);
    }

    #[test]
    fn duplicate_geometry_rows_keep_the_first() {
        let mut tables = sample();
        let mut dup = geom("1", None);
        dup.centroid = GeoPoint::new(0.0, 0.0);
        tables.bays.push(dup);

        let fused = fuse(&tables);
        assert_eq!(fused.collection.len(), 4);
        assert_eq!(fused.collection.get("1").map(|b| b.latitude), Some(-37.81));
    }

    #[test]
    fn report_counts_attributes() {
        let report = fuse(&sample()).report;
        assert_eq!(report.occupied, 1);
        assert_eq!(report.accessible, 1);
        assert_eq!(report.priced, 1);
        assert_eq!(report.collapsed, 0);
    }

    #[test]
    fn payload_failure_stops_fusion() {
        let payloads = SourcePayloads {
            bays: br#"{"type":"FeatureCollection","features":[]}"#.to_vec(),
            occupancy: b"bay_id,occupied_id\n".to_vec(),
            disability: b"not,the,right,columns\n".to_vec(),
            zones: b"rd_seg_id,pay_stay_zone\n".to_vec(),
            costs: b"pay_stay_zone,cost_per_hour\n".to_vec(),
        };
        let err = fuse_payloads(&payloads).unwrap_err();
        assert_eq!(err.dataset, DatasetKind::Disability);
    }
}
