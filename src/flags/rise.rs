//! Rise without precipitation (D04 in-situ, D05 model).
//!
//! A soil-moisture rise is suspect when it is recent (positive over the last
//! hour), large (the rise over the last day exceeds twice the recent
//! standard deviation), and no precipitation event can explain it.
//!
//! Both variants share the algorithm and differ only in which precipitation
//! column they read and how it is aggregated:
//!
//! | flag | column                | signal                       |
//! |------|-----------------------|------------------------------|
//! | 7    | `precipitation`       | value of the current hour    |
//! | 8    | `gldas_precipitation` | trailing 24-hour sum         |
//!
//! Meant for near-surface sensors; the pipeline decides applicability from
//! the sensor profile.

use crate::analysis::rolling::{diff, rolling_std, rolling_sum};
use crate::config::RiseConfig;
use crate::flags::{Detection, Detector, FlagContext};
use crate::model::{Column, Flag};

/// How the precipitation column is turned into a per-hour signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// The value recorded for the current hour.
    Instantaneous,
    /// Sum over the trailing window ending at the current hour, defined as
    /// soon as one sample in the window is valid.
    TrailingSum { window: usize },
}

impl Aggregation {
    pub fn apply(self, precipitation: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            Aggregation::Instantaneous => precipitation.to_vec(),
            Aggregation::TrailingSum { window } => rolling_sum(precipitation, window, 1),
        }
    }
}

/// Flags rows where soil moisture rose without qualifying precipitation.
///
/// `precipitation_signal` must already be aggregated and aligned with
/// `soil_moisture`. A row with any missing operand is never flagged.
pub fn rise_without_precipitation(
    soil_moisture: &[Option<f64>],
    precipitation_signal: &[Option<f64>],
    config: &RiseConfig,
) -> Vec<bool> {
    let std = rolling_std(soil_moisture, config.std_window, config.std_min_periods);
    let rise_long = diff(soil_moisture, config.long_lag);
    let rise_short = diff(soil_moisture, config.short_lag);

    (0..soil_moisture.len())
        .map(|t| {
            let (Some(std), Some(long), Some(short), Some(precip)) = (
                std[t],
                rise_long[t],
                rise_short[t],
                precipitation_signal.get(t).copied().flatten(),
            ) else {
                return false;
            };
            short > 0.0 && long > 2.0 * std && precip < config.min_precipitation
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiseDetector {
    flag: Flag,
    source: Column,
    aggregation: Aggregation,
    config: RiseConfig,
}

impl RiseDetector {
    /// D04: current-hour in-situ precipitation.
    pub fn in_situ(config: &RiseConfig) -> Self {
        Self {
            flag: Flag::RiseWithoutPrecipitation,
            source: Column::Precipitation,
            aggregation: Aggregation::Instantaneous,
            config: config.clone(),
        }
    }

    /// D05: model precipitation accumulated over the trailing window.
    pub fn model(config: &RiseConfig) -> Self {
        Self {
            flag: Flag::RiseWithoutModelPrecipitation,
            source: Column::GldasPrecipitation,
            aggregation: Aggregation::TrailingSum {
                window: config.model_precipitation_window,
            },
            config: config.clone(),
        }
    }
}

impl Detector for RiseDetector {
    fn flag(&self) -> Flag {
        self.flag
    }

    fn required_column(&self) -> Option<Column> {
        Some(self.source)
    }

    fn detect(&self, ctx: &FlagContext<'_>) -> Detection {
        let Some(precipitation) = ctx.series().column(self.source) else {
            return Detection::empty(self.flag);
        };
        let signal = self.aggregation.apply(precipitation);
        let mask = rise_without_precipitation(ctx.series().soil_moisture(), &signal, &self.config);
        Detection::from_mask(self.flag, &mask)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
