//! Core data types for the soil-moisture quality-control service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the hourly observation series, the optional ancillary columns, the flag
//! code space and the series error type. It contains no detector logic.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Optional columns
// ---------------------------------------------------------------------------

/// Ancillary columns that a dataset may or may not carry.
///
/// Presence is a property of the whole dataset, not of a row: a column is
/// either attached to the series (possibly with missing rows) or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    SoilTemperature,
    AirTemperature,
    GldasSoilTemperature,
    Precipitation,
    GldasPrecipitation,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::SoilTemperature => write!(f, "soil_temperature"),
            Column::AirTemperature => write!(f, "air_temperature"),
            Column::GldasSoilTemperature => write!(f, "gldas_soil_temperature"),
            Column::Precipitation => write!(f, "precipitation"),
            Column::GldasPrecipitation => write!(f, "gldas_precipitation"),
        }
    }
}

// ---------------------------------------------------------------------------
// Flag codes
// ---------------------------------------------------------------------------

/// Quality flags emitted by this crate, one per failed rule.
///
/// The discriminant is the integer code written into `qflag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Flag {
    /// C01: soil moisture below the lower plausibility bound.
    BelowLowerBound = 1,
    /// C02: soil moisture above the upper plausibility bound.
    AboveUpperBound = 2,
    /// C03: soil moisture above the station saturation point.
    AboveSaturation = 3,
    /// D01: in-situ soil temperature below freezing.
    SoilFrozen = 4,
    /// D02: in-situ air temperature below freezing.
    AirFrozen = 5,
    /// D03: model soil temperature below freezing.
    ModelSoilFrozen = 6,
    /// D04: rise without in-situ precipitation.
    RiseWithoutPrecipitation = 7,
    /// D05: rise without model precipitation.
    RiseWithoutModelPrecipitation = 8,
    /// D06: one- or two-hour spike.
    Spike = 9,
}

/// Codes set aside for rules that are not implemented (D07/D08, D09, D10
/// and the general rule G). No detector ever emits them.
pub const RESERVED_CODES: [u8; 5] = [10, 11, 12, 13, 14];

impl Flag {
    pub const ALL: [Flag; 9] = [
        Flag::BelowLowerBound,
        Flag::AboveUpperBound,
        Flag::AboveSaturation,
        Flag::SoilFrozen,
        Flag::AirFrozen,
        Flag::ModelSoilFrozen,
        Flag::RiseWithoutPrecipitation,
        Flag::RiseWithoutModelPrecipitation,
        Flag::Spike,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Flag> {
        Flag::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Short rule label as used in ISMN quality documentation (C01, D06, ...).
    pub fn label(self) -> &'static str {
        match self {
            Flag::BelowLowerBound => "C01",
            Flag::AboveUpperBound => "C02",
            Flag::AboveSaturation => "C03",
            Flag::SoilFrozen => "D01",
            Flag::AirFrozen => "D02",
            Flag::ModelSoilFrozen => "D03",
            Flag::RiseWithoutPrecipitation => "D04",
            Flag::RiseWithoutModelPrecipitation => "D05",
            Flag::Spike => "D06",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

// ---------------------------------------------------------------------------
// Observation series
// ---------------------------------------------------------------------------

/// An hourly soil-moisture record held column-wise.
///
/// Gaps are rows whose value is `None`, never omitted rows, so every column
/// is index-aligned with `timestamps`. Optional columns use an outer
/// `Option` for dataset-level presence.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilMoistureSeries {
    timestamps: Vec<DateTime<Utc>>,
    soil_moisture: Vec<Option<f64>>,
    soil_temperature: Option<Vec<Option<f64>>>,
    air_temperature: Option<Vec<Option<f64>>>,
    gldas_soil_temperature: Option<Vec<Option<f64>>>,
    precipitation: Option<Vec<Option<f64>>>,
    gldas_precipitation: Option<Vec<Option<f64>>>,
}

/// NaN and infinite readings are stored as missing.
fn finite_only(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect()
}

impl SoilMoistureSeries {
    /// Creates a series with only the required soil-moisture column.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        soil_moisture: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        if timestamps.len() != soil_moisture.len() {
            return Err(SeriesError::LengthMismatch {
                column: "soil_moisture".to_string(),
                expected: timestamps.len(),
                found: soil_moisture.len(),
            });
        }
        Ok(Self {
            timestamps,
            soil_moisture: finite_only(soil_moisture),
            soil_temperature: None,
            air_temperature: None,
            gldas_soil_temperature: None,
            precipitation: None,
            gldas_precipitation: None,
        })
    }

    /// Creates a series of consecutive hours starting at `start`.
    pub fn hourly(start: DateTime<Utc>, soil_moisture: Vec<Option<f64>>) -> Self {
        let timestamps = (0..soil_moisture.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        Self {
            timestamps,
            soil_moisture: finite_only(soil_moisture),
            soil_temperature: None,
            air_temperature: None,
            gldas_soil_temperature: None,
            precipitation: None,
            gldas_precipitation: None,
        }
    }

    /// Attaches an optional column, replacing any previous values for it.
    pub fn with_column(mut self, column: Column, values: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if values.len() != self.timestamps.len() {
            return Err(SeriesError::LengthMismatch {
                column: column.to_string(),
                expected: self.timestamps.len(),
                found: values.len(),
            });
        }
        let slot = match column {
            Column::SoilTemperature => &mut self.soil_temperature,
            Column::AirTemperature => &mut self.air_temperature,
            Column::GldasSoilTemperature => &mut self.gldas_soil_temperature,
            Column::Precipitation => &mut self.precipitation,
            Column::GldasPrecipitation => &mut self.gldas_precipitation,
        };
        *slot = Some(finite_only(values));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn soil_moisture(&self) -> &[Option<f64>] {
        &self.soil_moisture
    }

    /// Returns the optional column, or `None` if the dataset does not carry it.
    pub fn column(&self, column: Column) -> Option<&[Option<f64>]> {
        match column {
            Column::SoilTemperature => self.soil_temperature.as_deref(),
            Column::AirTemperature => self.air_temperature.as_deref(),
            Column::GldasSoilTemperature => self.gldas_soil_temperature.as_deref(),
            Column::Precipitation => self.precipitation.as_deref(),
            Column::GldasPrecipitation => self.gldas_precipitation.as_deref(),
        }
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.column(column).is_some()
    }
}

/// Checks the shape the detectors assume: strictly increasing timestamps
/// spaced exactly one hour apart.
///
/// Detectors never call this; it is for callers to run before flagging.
pub fn validate_series(series: &SoilMoistureSeries) -> Result<(), SeriesError> {
    for (i, pair) in series.timestamps().windows(2).enumerate() {
        let step = pair[1] - pair[0];
        if step <= Duration::zero() {
            return Err(SeriesError::NotIncreasing { index: i + 1 });
        }
        if step != Duration::hours(1) {
            return Err(SeriesError::IrregularSpacing {
                index: i + 1,
                step_minutes: step.num_minutes(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while assembling or validating an observation series.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesError {
    /// A column does not have one value per timestamp.
    LengthMismatch { column: String, expected: usize, found: usize },
    /// The timestamp at `index` is not later than its predecessor.
    NotIncreasing { index: usize },
    /// The step into `index` is not exactly one hour.
    IrregularSpacing { index: usize, step_minutes: i64 },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesError::LengthMismatch { column, expected, found } => write!(
                f,
                "Column {} has {} values, expected {}",
                column, found, expected
            ),
            SeriesError::NotIncreasing { index } => {
                write!(f, "Timestamp at row {} is not after the previous row", index)
            }
            SeriesError::IrregularSpacing { index, step_minutes } => write!(
                f,
                "Row {} is {} minutes after the previous row, expected 60",
                index, step_minutes
            ),
        }
    }
}

impl std::error::Error for SeriesError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
