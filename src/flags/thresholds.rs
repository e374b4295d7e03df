//! Static threshold rules.
//!
//! Each rule compares one column against a fixed bound, row by row. Missing
//! values never fail a rule. Covers:
//! - C01/C02: soil moisture outside the plausible range,
//! - C03: soil moisture above the station saturation point,
//! - D01–D03: in-situ soil, in-situ air and model soil temperature below
//!   freezing.

use crate::config::BoundsConfig;
use crate::flags::{Detection, Detector, FlagContext};
use crate::model::{Column, Flag};

/// Column a threshold rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    SoilMoisture,
    Optional(Column),
}

/// Which side of the bound fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// Fails when the value is strictly below.
    Below(f64),
    /// Fails when the value is strictly above.
    Above(f64),
}

impl Bound {
    pub fn fails(self, value: Option<f64>) -> bool {
        match (self, value) {
            (Bound::Below(limit), Some(v)) => v < limit,
            (Bound::Above(limit), Some(v)) => v > limit,
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDetector {
    flag: Flag,
    source: Source,
    bound: Bound,
}

impl ThresholdDetector {
    pub fn new(flag: Flag, source: Source, bound: Bound) -> Self {
        Self { flag, source, bound }
    }
}

impl Detector for ThresholdDetector {
    fn flag(&self) -> Flag {
        self.flag
    }

    fn required_column(&self) -> Option<Column> {
        match self.source {
            Source::SoilMoisture => None,
            Source::Optional(column) => Some(column),
        }
    }

    fn detect(&self, ctx: &FlagContext<'_>) -> Detection {
        let values = match self.source {
            Source::SoilMoisture => ctx.series().soil_moisture(),
            Source::Optional(column) => match ctx.series().column(column) {
                Some(values) => values,
                None => return Detection::empty(self.flag),
            },
        };
        let mask: Vec<bool> = values.iter().map(|v| self.bound.fails(*v)).collect();
        Detection::from_mask(self.flag, &mask)
    }
}

/// Builds the threshold rules for one sensor.
///
/// The saturation rule is included only for a usable saturation point; a
/// missing or zero value means the station has no reference and C03 is
/// skipped.
pub fn threshold_detectors(bounds: &BoundsConfig, saturation_point: Option<f64>) -> Vec<ThresholdDetector> {
    let freezing = Bound::Below(bounds.freezing_point);
    let mut detectors = vec![
        ThresholdDetector::new(Flag::BelowLowerBound, Source::SoilMoisture, Bound::Below(bounds.lower)),
        ThresholdDetector::new(Flag::AboveUpperBound, Source::SoilMoisture, Bound::Above(bounds.upper)),
    ];

    if let Some(sat) = saturation_point.filter(|s| *s != 0.0) {
        detectors.push(ThresholdDetector::new(
            Flag::AboveSaturation,
            Source::SoilMoisture,
            Bound::Above(sat),
        ));
    }

    detectors.extend([
        ThresholdDetector::new(Flag::SoilFrozen, Source::Optional(Column::SoilTemperature), freezing),
        ThresholdDetector::new(Flag::AirFrozen, Source::Optional(Column::AirTemperature), freezing),
        ThresholdDetector::new(
            Flag::ModelSoilFrozen,
            Source::Optional(Column::GldasSoilTemperature),
            freezing,
        ),
    ]);
    detectors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SoilMoistureSeries;
    use chrono::{TimeZone, Utc};

    fn series(values: &[Option<f64>]) -> SoilMoistureSeries {
        let start = Utc.with_ymd_and_hms(2017, 1, 27, 0, 0, 0).unwrap();
        SoilMoistureSeries::hourly(start, values.to_vec())
    }

    fn run(detector: &ThresholdDetector, s: &SoilMoistureSeries) -> Option<Vec<usize>> {
        detector.evaluate(&FlagContext::new(s)).map(|d| d.rows)
    }

    fn find(detectors: &[ThresholdDetector], flag: Flag) -> Option<&ThresholdDetector> {
        detectors.iter().find(|d| d.flag() == flag)
    }

    #[test]
    fn test_bounds_are_strict() {
        assert!(!Bound::Below(0.0).fails(Some(0.0)), "value equal to the lower bound passes");
        assert!(Bound::Below(0.0).fails(Some(-0.1)));
        assert!(!Bound::Above(60.0).fails(Some(60.0)), "value equal to the upper bound passes");
        assert!(Bound::Above(60.0).fails(Some(60.1)));
        assert!(!Bound::Above(60.0).fails(None), "missing values never fail");
    }

    #[test]
    fn test_lower_and_upper_bound_rows() {
        let s = series(&[Some(5.1), Some(-0.5), Some(61.0), None, Some(60.0)]);
        let detectors = threshold_detectors(&BoundsConfig::default(), None);

        let low = find(&detectors, Flag::BelowLowerBound).unwrap();
        assert_eq!(run(low, &s), Some(vec![1]));

        let high = find(&detectors, Flag::AboveUpperBound).unwrap();
        assert_eq!(run(high, &s), Some(vec![2]));
    }

    #[test]
    fn test_saturation_rule_only_with_reference_value() {
        let bounds = BoundsConfig::default();
        assert!(find(&threshold_detectors(&bounds, None), Flag::AboveSaturation).is_none());
        assert!(
            find(&threshold_detectors(&bounds, Some(0.0)), Flag::AboveSaturation).is_none(),
            "a zero saturation point means no reference"
        );

        let detectors = threshold_detectors(&bounds, Some(42.7));
        let sat = find(&detectors, Flag::AboveSaturation).expect("rule should be built");
        let s = series(&[Some(42.7), Some(42.8)]);
        assert_eq!(run(sat, &s), Some(vec![1]));
    }

    #[test]
    fn test_temperature_rules_skip_absent_columns() {
        let s = series(&[Some(20.0); 3]);
        for d in threshold_detectors(&BoundsConfig::default(), None) {
            if d.required_column().is_some() {
                assert_eq!(run(&d, &s), None, "{} should be skipped without its column", d.flag());
            }
        }
    }

    #[test]
    fn test_frozen_air_rows() {
        let s = series(&[Some(20.0); 4])
            .with_column(Column::AirTemperature, vec![Some(1.0), Some(-0.2), None, Some(0.0)])
            .unwrap();
        let detectors = threshold_detectors(&BoundsConfig::default(), None);
        let air = find(&detectors, Flag::AirFrozen).unwrap();
        assert_eq!(run(air, &s), Some(vec![1]));

        let soil = find(&detectors, Flag::SoilFrozen).unwrap();
        assert_eq!(run(soil, &s), None);
    }

    #[test]
    fn test_custom_freezing_point() {
        let bounds = BoundsConfig {
            freezing_point: 1.0,
            ..BoundsConfig::default()
        };
        let s = series(&[Some(20.0); 2])
            .with_column(Column::GldasSoilTemperature, vec![Some(0.5), Some(1.5)])
            .unwrap();
        let detectors = threshold_detectors(&bounds, None);
        let model = find(&detectors, Flag::ModelSoilFrozen).unwrap();
        assert_eq!(run(model, &s), Some(vec![0]));
    }
}
