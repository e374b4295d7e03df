//! Runs every applicable rule over one series and merges the results.
//!
//! Detectors are evaluated in parallel against a shared `FlagContext` and
//! their detections are applied to a fresh `QualityFlags` in code order, so
//! the output matches a sequential run.

use rayon::prelude::*;

use crate::config::QcConfig;
use crate::flags::rise::RiseDetector;
use crate::flags::spike::SpikeDetector;
use crate::flags::thresholds::threshold_detectors;
use crate::flags::{Detection, Detector, FlagContext};
use crate::logging::{self, Stage};
use crate::model::{Flag, SoilMoistureSeries};
use crate::qflag::QualityFlags;
use crate::stations::SensorProfile;

/// Whether the rise rules apply to a sensor. With no profile the depth is
/// unknown and the rules run.
pub fn rise_rules_apply(config: &QcConfig, profile: Option<&SensorProfile>) -> bool {
    profile.is_none_or(|p| p.is_near_surface(config.rise.near_surface_max_depth_m))
}

/// Builds the detector set for one sensor, ordered by flag code.
pub fn build_detectors(config: &QcConfig, profile: Option<&SensorProfile>) -> Vec<Box<dyn Detector>> {
    let saturation_point = profile
        .and_then(|p| p.saturation_point)
        .or(config.bounds.saturation_point);

    let mut detectors: Vec<Box<dyn Detector>> = threshold_detectors(&config.bounds, saturation_point)
        .into_iter()
        .map(|d| Box::new(d) as Box<dyn Detector>)
        .collect();

    if rise_rules_apply(config, profile) {
        detectors.push(Box::new(RiseDetector::in_situ(&config.rise)));
        detectors.push(Box::new(RiseDetector::model(&config.rise)));
    }

    detectors.push(Box::new(SpikeDetector::new(&config.spike)));
    detectors.sort_by_key(|d| d.flag().code());
    detectors
}

/// Flags one series. `profile` supplies the station tag for log output, the
/// sensor depth and, when known, the saturation point.
pub fn flag_series(
    series: &SoilMoistureSeries,
    config: &QcConfig,
    profile: Option<&SensorProfile>,
) -> QualityFlags {
    let tag = profile.map(SensorProfile::tag);
    let station = tag.as_deref();
    let total = series.len();

    if !rise_rules_apply(config, profile) {
        logging::debug(
            Stage::Pipeline,
            station,
            &format!(
                "rise rules skipped: sensor deeper than {} m",
                config.rise.near_surface_max_depth_m
            ),
        );
    }

    let detectors = build_detectors(config, profile);
    let ctx = FlagContext::new(series);
    logging::debug(
        Stage::Derivatives,
        station,
        &format!(
            "{} of {} rows have a second derivative",
            ctx.derivatives().deriv2.iter().filter(|d| d.is_some()).count(),
            total
        ),
    );

    let results: Vec<(Flag, Option<Detection>)> = detectors
        .par_iter()
        .map(|d| (d.flag(), d.evaluate(&ctx)))
        .collect();

    let mut flags = QualityFlags::new(total);
    for (detector, (flag, result)) in detectors.iter().zip(&results) {
        match result {
            Some(detection) => {
                flags.apply(detection);
                logging::log_rule_summary(station, *flag, detection.rows.len(), total);
            }
            None => {
                if let Some(column) = detector.required_column() {
                    logging::log_rule_skipped(station, *flag, column);
                }
            }
        }
    }

    let flagged_rows = flags.iter().filter(|set| !set.is_empty()).count();
    logging::info(
        Stage::Pipeline,
        station,
        &format!("{} of {} observations carry at least one flag", flagged_rows, total),
    );
    flags
}

/// Flags one series and renders the per-row output as a JSON array of
/// `{timestamp, soil_moisture, qflag}` objects.
pub fn flag_series_json(
    series: &SoilMoistureSeries,
    config: &QcConfig,
    profile: Option<&SensorProfile>,
) -> Result<String, serde_json::Error> {
    let flags = flag_series(series, config, profile);
    serde_json::to_string(&flags.observations(series))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    fn profile(depth_to_m: f64, saturation_point: Option<f64>) -> SensorProfile {
        SensorProfile {
            station: "Zamarron".to_string(),
            sensor: "ThetaProbe".to_string(),
            depth_from_m: 0.0,
            depth_to_m,
            saturation_point,
        }
    }

    fn codes(detectors: &[Box<dyn Detector>]) -> Vec<u8> {
        detectors.iter().map(|d| d.flag().code()).collect()
    }

    fn series(values: Vec<Option<f64>>) -> SoilMoistureSeries {
        let start = Utc.with_ymd_and_hms(2017, 1, 27, 0, 0, 0).unwrap();
        SoilMoistureSeries::hourly(start, values)
    }

    #[test]
    fn test_default_detector_set_is_in_code_order() {
        let detectors = build_detectors(&QcConfig::default(), None);
        assert_eq!(codes(&detectors), vec![1, 2, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_profile_saturation_point_overrides_config() {
        let mut config = QcConfig::default();
        config.bounds.saturation_point = Some(50.0);
        assert!(codes(&build_detectors(&config, None)).contains(&3));

        let p = profile(0.05, Some(0.0));
        assert!(
            codes(&build_detectors(&QcConfig::default(), Some(&p))).iter().all(|c| *c != 3),
            "zero saturation point means no reference"
        );

        let p = profile(0.05, Some(42.7));
        let s = series(vec![Some(42.0), Some(45.0), Some(55.0)]);
        let flags = flag_series(&s, &config, Some(&p));
        assert_eq!(flags.rows_with(Flag::AboveSaturation), vec![1, 2]);
    }

    #[test]
    fn test_deep_sensor_drops_rise_rules() {
        let deep = profile(0.5, None);
        let config = QcConfig::default();
        assert!(!rise_rules_apply(&config, Some(&deep)));
        assert_eq!(codes(&build_detectors(&config, Some(&deep))), vec![1, 2, 4, 5, 6, 9]);

        let shallow = profile(0.05, None);
        assert!(rise_rules_apply(&config, Some(&shallow)));
        assert!(rise_rules_apply(&config, None));
    }

    #[test]
    fn test_flag_series_merges_rules_per_row() {
        let mut values = vec![Some(20.0); 100];
        for v in values.iter_mut().skip(70) {
            *v = Some(25.0);
        }
        values[5] = Some(-1.0);
        let s = series(values)
            .with_column(Column::Precipitation, vec![Some(0.0); 100])
            .unwrap();

        let flags = flag_series(&s, &QcConfig::default(), None);
        assert_eq!(flags.len(), 100);
        assert!(flags.contains(5, Flag::BelowLowerBound));
        assert_eq!(flags.get(70), Some(&BTreeSet::from([7])));
        assert_eq!(flags.get(71), Some(&BTreeSet::new()));
    }

    #[test]
    fn test_parallel_result_matches_sequential_application() {
        let mut values: Vec<Option<f64>> = (0..120)
            .map(|t| Some(25.0 + 3.0 * (t as f64 / 9.0).sin()))
            .collect();
        values[40] = Some(33.0);
        values[90] = Some(70.0);
        let s = series(values)
            .with_column(Column::AirTemperature, (0..120).map(|t| Some(t as f64 - 10.0)).collect())
            .unwrap()
            .with_column(Column::Precipitation, vec![Some(0.0); 120])
            .unwrap();
        let config = QcConfig::default();

        let ctx = FlagContext::new(&s);
        let mut sequential = QualityFlags::new(s.len());
        for d in build_detectors(&config, None).iter().rev() {
            if let Some(detection) = d.evaluate(&ctx) {
                sequential.apply(&detection);
            }
        }
        assert_eq!(flag_series(&s, &config, None), sequential);
    }

    #[test]
    fn test_json_output_shape() {
        let s = series(vec![Some(20.0), Some(61.0), None]);
        let json = flag_series_json(&s, &QcConfig::default(), None).expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let rows = value.as_array().expect("array of rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["qflag"], serde_json::json!([2]));
        assert_eq!(rows[0]["qflag"], serde_json::json!([]));
        assert!(rows[2]["soil_moisture"].is_null());
        assert!(rows[0]["timestamp"].as_str().unwrap().starts_with("2017-01-27T00:00:00"));
    }
}
