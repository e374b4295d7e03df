//! Quality rules and the seam they share.
//!
//! Each rule is a `Detector`: a pure function from an immutable series to a
//! `Detection` (the rows that fail the rule). Detectors never touch the
//! `qflag` table themselves; `qflag::QualityFlags` merges their output.
//!
//! Submodules:
//! - `thresholds` — static bound checks (C01–C03, D01–D03).
//! - `rise` — rise without precipitation (D04, D05).
//! - `spike` — one- and two-hour spikes (D06).
//! - `peak` — local peak classification used by the spike rule.

pub mod peak;
pub mod rise;
pub mod spike;
pub mod thresholds;

use crate::analysis::{smoothed_derivatives, Derivatives};
use crate::model::{Column, Flag, SoilMoistureSeries};

// ---------------------------------------------------------------------------
// Detector output
// ---------------------------------------------------------------------------

/// Rows that failed one rule, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub flag: Flag,
    pub rows: Vec<usize>,
}

impl Detection {
    pub fn from_mask(flag: Flag, mask: &[bool]) -> Self {
        let rows = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &hit)| hit.then_some(i))
            .collect();
        Self { flag, rows }
    }

    pub fn empty(flag: Flag) -> Self {
        Self { flag, rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Shared input
// ---------------------------------------------------------------------------

/// The series under test plus derived data that several rules read.
///
/// Derivatives are computed once here so the spike rule does not redo them
/// per call.
pub struct FlagContext<'a> {
    series: &'a SoilMoistureSeries,
    derivatives: Derivatives,
}

impl<'a> FlagContext<'a> {
    pub fn new(series: &'a SoilMoistureSeries) -> Self {
        let derivatives = smoothed_derivatives(series.soil_moisture());
        Self { series, derivatives }
    }

    pub fn series(&self) -> &SoilMoistureSeries {
        self.series
    }

    pub fn derivatives(&self) -> &Derivatives {
        &self.derivatives
    }
}

// ---------------------------------------------------------------------------
// Detector trait
// ---------------------------------------------------------------------------

pub trait Detector: Send + Sync {
    /// The flag this detector emits.
    fn flag(&self) -> Flag;

    /// Optional column the rule reads. The rule is skipped when the series
    /// does not carry it.
    fn required_column(&self) -> Option<Column> {
        None
    }

    /// Evaluates the rule. Implementations may assume the required column
    /// is present.
    fn detect(&self, ctx: &FlagContext<'_>) -> Detection;

    /// Evaluates the rule, or returns `None` when its column is absent.
    fn evaluate(&self, ctx: &FlagContext<'_>) -> Option<Detection> {
        if let Some(column) = self.required_column() {
            if !ctx.series().has_column(column) {
                return None;
            }
        }
        Some(self.detect(ctx))
    }
}
