//! Array aggregation
//!
//! Infrasound arrays report one station per element (`IS31`, `IS32`, ...).
//! Elements share the array prefix plus the array digit, so `IS31` and `IS32`
//! both belong to array `IS3`. Codes outside that pattern form a singleton
//! array named after the code itself.

use std::collections::btree_map::{self, BTreeMap};

use serde::Serialize;

use crate::error::AggregateError;
use crate::record::StationSet;

/// Network prefix shared by array element codes
pub const ARRAY_PREFIX: &str = "IS";

/// Array identifier for a station code
///
/// `IS` + ASCII digit + anything maps to its first three characters; every
/// other code is its own array. Case sensitive.
pub fn classify(code: &str) -> String {
    match array_prefix(code) {
        Some(prefix) => prefix.to_string(),
        None => code.to_string(),
    }
}

/// Label drawn next to an array symbol: the array digit, or the full identifier
pub fn display_label(array_id: &str) -> String {
    match array_prefix(array_id) {
        Some(prefix) => prefix[ARRAY_PREFIX.len()..].to_string(),
        None => array_id.to_string(),
    }
}

/// `IS` plus the digit, when `code` follows the element naming rule
fn array_prefix(code: &str) -> Option<&str> {
    let rest = code.strip_prefix(ARRAY_PREFIX)?;
    let digit = rest.chars().next()?;
    if digit.is_ascii_digit() {
        Some(&code[..ARRAY_PREFIX.len() + digit.len_utf8()])
    } else {
        None
    }
}

/// Centroid of all stations sharing an array identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayGroup {
    pub array_id: String,
    /// Mean member latitude
    pub lat: f64,
    /// Mean member longitude
    pub lon: f64,
    /// Number of stations averaged
    pub members: usize,
}

impl ArrayGroup {
    pub fn label(&self) -> String {
        display_label(&self.array_id)
    }
}

/// Array centroids in lexicographic identifier order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayGroups {
    groups: BTreeMap<String, ArrayGroup>,
}

impl ArrayGroups {
    pub fn get(&self, array_id: &str) -> Option<&ArrayGroup> {
        self.groups.get(array_id)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, ArrayGroup> {
        self.groups.values()
    }

    pub fn lats(&self) -> Vec<f64> {
        self.iter().map(|g| g.lat).collect()
    }

    pub fn lons(&self) -> Vec<f64> {
        self.iter().map(|g| g.lon).collect()
    }
}

impl<'a> IntoIterator for &'a ArrayGroups {
    type Item = &'a ArrayGroup;
    type IntoIter = btree_map::Values<'a, String, ArrayGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Running per-axis sum and extent of one array's members
struct Accumulator {
    lat_sum: f64,
    lon_sum: f64,
    lat_range: (f64, f64),
    lon_range: (f64, f64),
    count: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            lat_sum: 0.0,
            lon_sum: 0.0,
            lat_range: (f64::INFINITY, f64::NEG_INFINITY),
            lon_range: (f64::INFINITY, f64::NEG_INFINITY),
            count: 0,
        }
    }
}

impl Accumulator {
    fn add(&mut self, lat: f64, lon: f64) {
        self.lat_sum += lat;
        self.lon_sum += lon;
        self.lat_range = (self.lat_range.0.min(lat), self.lat_range.1.max(lat));
        self.lon_range = (self.lon_range.0.min(lon), self.lon_range.1.max(lon));
        self.count += 1;
    }

    /// Mean per axis, clamped to the members' extent so rounding in the
    /// sum can never push the centroid outside their bounding box
    fn centroid(&self) -> (f64, f64) {
        let n = self.count as f64;
        let lat = (self.lat_sum / n).clamp(self.lat_range.0, self.lat_range.1);
        let lon = (self.lon_sum / n).clamp(self.lon_range.0, self.lon_range.1);
        (lat, lon)
    }
}

/// Collapse element stations into one centroid per array
pub fn aggregate(stations: &StationSet) -> Result<ArrayGroups, AggregateError> {
    if stations.is_empty() {
        return Err(AggregateError::NoStations);
    }

    let mut sums: BTreeMap<String, Accumulator> = BTreeMap::new();
    for station in stations {
        sums.entry(classify(&station.code))
            .or_default()
            .add(station.lat, station.lon);
    }

    let groups = sums
        .into_iter()
        .map(|(array_id, acc)| {
            let (lat, lon) = acc.centroid();
            let group = ArrayGroup {
                array_id: array_id.clone(),
                lat,
                lon,
                members: acc.count,
            };
            (array_id, group)
        })
        .collect();

    Ok(ArrayGroups { groups })
}
