use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::BayRecord;

/// Bays in source order, unique by `bay_id`.
///
/// Ordering contract:
/// - Iteration yields bays in insertion order.
/// - When two records share a `bay_id`, the first one inserted is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<BayRecord>", into = "Vec<BayRecord>")]
pub struct BayCollection {
    bays: Vec<BayRecord>,
    by_id: HashMap<String, usize>,
}

impl BayCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = BayRecord>) -> Self {
        let mut out = Self::new();
        for record in records {
            out.insert(record);
        }
        out
    }

    /// Inserts `record` unless its id is already present.
    ///
    /// Returns `true` if the collection changed.
    pub fn insert(&mut self, record: BayRecord) -> bool {
        if self.by_id.contains_key(&record.bay_id) {
            return false;
        }
        self.by_id.insert(record.bay_id.clone(), self.bays.len());
        self.bays.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.bays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bays.is_empty()
    }

    pub fn get(&self, bay_id: &str) -> Option<&BayRecord> {
        self.position(bay_id).map(|i| &self.bays[i])
    }

    pub fn position(&self, bay_id: &str) -> Option<usize> {
        self.by_id.get(bay_id).copied()
    }

    pub fn get_index(&self, index: usize) -> Option<&BayRecord> {
        self.bays.get(index)
    }

    pub fn as_slice(&self) -> &[BayRecord] {
        &self.bays
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BayRecord> {
        self.bays.iter()
    }
}

impl From<Vec<BayRecord>> for BayCollection {
    fn from(records: Vec<BayRecord>) -> Self {
        Self::from_records(records)
    }
}

impl From<BayCollection> for Vec<BayRecord> {
    fn from(collection: BayCollection) -> Self {
        collection.bays
    }
}

impl<'a> IntoIterator for &'a BayCollection {
    type Item = &'a BayRecord;
    type IntoIter = std::slice::Iter<'a, BayRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.bays.iter()
    }
}
