//! Station records

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};

/// One physical sensor element as reported by the metadata source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Station code, e.g. `IS31`
    pub code: String,
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Network code, e.g. `SN`
    pub network: String,
}

impl StationRecord {
    pub fn new(code: impl Into<String>, lat: f64, lon: f64, network: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            lat,
            lon,
            network: network.into(),
        }
    }
}

/// Query result keyed by station code, iterated in code order
///
/// Inserting a code that is already present replaces the earlier record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationSet {
    stations: BTreeMap<String, StationRecord>,
}

impl StationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced
    pub fn insert(&mut self, record: StationRecord) -> Option<StationRecord> {
        self.stations.insert(record.code.clone(), record)
    }

    pub fn get(&self, code: &str) -> Option<&StationRecord> {
        self.stations.get(code)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, StationRecord> {
        self.stations.values()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.stations.keys().map(String::as_str)
    }
}

impl FromIterator<StationRecord> for StationSet {
    fn from_iter<I: IntoIterator<Item = StationRecord>>(iter: I) -> Self {
        let mut set = StationSet::new();
        for record in iter {
            set.insert(record);
        }
        set
    }
}

impl<'a> IntoIterator for &'a StationSet {
    type Item = &'a StationRecord;
    type IntoIter = btree_map::Values<'a, String, StationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
