//! The per-observation `qflag` table.
//!
//! One sorted set of flag codes per row. Detections are merged by set union,
//! so applying them in any order, or applying one twice, gives the same
//! table. Codes are only ever added.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::flags::Detection;
use crate::model::{Flag, SoilMoistureSeries};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct QualityFlags {
    rows: Vec<BTreeSet<u8>>,
}

/// One output row: the observation and the codes it collected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedObservation {
    pub timestamp: DateTime<Utc>,
    pub soil_moisture: Option<f64>,
    pub qflag: BTreeSet<u8>,
}

impl QualityFlags {
    /// An empty set for each of `len` rows.
    pub fn new(len: usize) -> Self {
        Self {
            rows: vec![BTreeSet::new(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds the detection's code to each listed row. Rows outside the table
    /// are ignored. Returns how many rows gained the code.
    pub fn apply(&mut self, detection: &Detection) -> usize {
        let code = detection.flag.code();
        let mut added = 0;
        for &row in &detection.rows {
            if let Some(set) = self.rows.get_mut(row) {
                if set.insert(code) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Union with another table of the same length.
    pub fn merge(&mut self, other: &QualityFlags) {
        for (mine, theirs) in self.rows.iter_mut().zip(&other.rows) {
            mine.extend(theirs.iter().copied());
        }
    }

    pub fn get(&self, row: usize) -> Option<&BTreeSet<u8>> {
        self.rows.get(row)
    }

    pub fn contains(&self, row: usize, flag: Flag) -> bool {
        self.rows.get(row).is_some_and(|set| set.contains(&flag.code()))
    }

    /// Rows carrying `flag`, ascending.
    pub fn rows_with(&self, flag: Flag) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&row| self.contains(row, flag))
            .collect()
    }

    /// Number of rows carrying each code that occurs at least once.
    pub fn summary(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for code in self.rows.iter().flatten() {
            *counts.entry(*code).or_insert(0) += 1;
        }
        counts
    }

    pub fn iter(&self) -> impl Iterator<Item = &BTreeSet<u8>> {
        self.rows.iter()
    }

    /// Pairs each row's codes with its observation.
    pub fn observations(&self, series: &SoilMoistureSeries) -> Vec<FlaggedObservation> {
        series
            .timestamps()
            .iter()
            .zip(series.soil_moisture())
            .zip(&self.rows)
            .map(|((timestamp, soil_moisture), qflag)| FlaggedObservation {
                timestamp: *timestamp,
                soil_moisture: *soil_moisture,
                qflag: qflag.clone(),
            })
            .collect()
    }
}
