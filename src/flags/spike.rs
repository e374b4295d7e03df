//! Spike detection (D06).
//!
//! A spike is a one- or two-hour excursion that returns to the baseline. At
//! each row `t` four criteria are evaluated:
//!
//! 1. `abrupt`: ratio `sm[t] / sm[t-1]`, rounded to 3 decimals, changes by
//!    more than ±15%.
//! 2. `symmetry`: ratio `|deriv2[t-1] / deriv2[t+1]|`, rounded to 3
//!    decimals, lies strictly inside (0.8, 1.2): the curve bends the same
//!    amount going into and out of the excursion.
//! 3. `dispersion`: variance of the 24 neighbours of `t` (centered window
//!    of 25, `t` excluded) over their mean is below 1: the neighbourhood is
//!    calm, so the anomaly is local to `t`.
//! 4. `shape`: `t` is a single or plateau peak of `[t-1, t, t+1, t+2]`.
//!
//! A row that completes a two-hour plateau (`shape[t-1]` is a plateau)
//! counts as abrupt regardless of criterion 1. A row is flagged when all
//! criteria hold, or when the previous row was a spike and this row
//! completes its plateau.
//!
//! Rows within `half_window` of either end never have a dispersion value
//! and are not flagged by the first test.

use crate::analysis::rolling::centered_neighbour_stats;
use crate::config::SpikeConfig;
use crate::flags::peak::{peak_shapes, PeakShape};
use crate::flags::{Detection, Detector, FlagContext};
use crate::logging::{self, Stage};
use crate::model::Flag;

/// Rounds half to even at `decimals` places.
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Per-row criteria values, index-aligned with the series.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeCriteria {
    /// Criterion 1: `sm[t] / sm[t-1]`.
    pub abrupt_ratio: Vec<Option<f64>>,
    /// Criterion 2: `|deriv2[t-1] / deriv2[t+1]|`.
    pub curvature_ratio: Vec<Option<f64>>,
    /// Criterion 3: neighbourhood variance over neighbourhood mean.
    pub dispersion: Vec<Option<f64>>,
    /// Criterion 4: peak shape of `[t-1, t, t+1, t+2]`.
    pub shape: Vec<Option<PeakShape>>,
    /// Row `t` is the second hour of a plateau.
    pub plateau_end: Vec<bool>,
}

impl SpikeCriteria {
    pub fn compute(soil_moisture: &[Option<f64>], deriv2: &[Option<f64>], half_window: usize) -> Self {
        let n = soil_moisture.len();

        let abrupt_ratio = (0..n)
            .map(|t| {
                if t == 0 {
                    return None;
                }
                Some(round_to(soil_moisture[t]? / soil_moisture[t - 1]?, 3))
            })
            .collect();

        let curvature_ratio = (0..n)
            .map(|t| {
                if t == 0 || t + 1 >= deriv2.len() {
                    return None;
                }
                Some(round_to((deriv2[t - 1]? / deriv2[t + 1]?).abs(), 3))
            })
            .collect();

        let dispersion = centered_neighbour_stats(soil_moisture, half_window)
            .into_iter()
            .map(|stats| stats.map(|s| s.variance.abs() / s.mean))
            .collect();

        let shape = peak_shapes(soil_moisture);
        let plateau_end = (0..n)
            .map(|t| t > 0 && shape[t - 1] == Some(PeakShape::Plateau))
            .collect();

        Self {
            abrupt_ratio,
            curvature_ratio,
            dispersion,
            shape,
            plateau_end,
        }
    }

    /// Rows where all four criteria hold.
    pub fn spikes(&self, config: &SpikeConfig) -> Vec<bool> {
        let upper = 1.0 + config.ratio_threshold;
        let lower = 1.0 - config.ratio_threshold;

        (0..self.shape.len())
            .map(|t| {
                let abrupt = self.abrupt_ratio[t].is_some_and(|r| r > upper || r < lower)
                    || self.plateau_end[t];
                let symmetric = self.curvature_ratio[t]
                    .is_some_and(|r| r > config.deriv2_ratio_min && r < config.deriv2_ratio_max);
                let calm = self.dispersion[t].is_some_and(|d| d < config.variance_ratio_max);
                let peak = self.shape[t].is_some_and(PeakShape::is_peak);
                abrupt && symmetric && calm && peak
            })
            .collect()
    }

    /// Final flag mask: a spike row, or the trailing hour of a plateau spike.
    pub fn flags(&self, config: &SpikeConfig) -> Vec<bool> {
        let spike = self.spikes(config);
        (0..spike.len())
            .map(|t| spike[t] || (t > 0 && spike[t - 1] && self.plateau_end[t]))
            .collect()
    }
}

/// Flags spikes in `soil_moisture` given its smoothed second derivative.
pub fn spike_mask(soil_moisture: &[Option<f64>], deriv2: &[Option<f64>], config: &SpikeConfig) -> Vec<bool> {
    SpikeCriteria::compute(soil_moisture, deriv2, config.half_window).flags(config)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpikeDetector {
    config: SpikeConfig,
}

impl SpikeDetector {
    pub fn new(config: &SpikeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl Detector for SpikeDetector {
    fn flag(&self) -> Flag {
        Flag::Spike
    }

    fn detect(&self, ctx: &FlagContext<'_>) -> Detection {
        let series = ctx.series();
        let window = 2 * self.config.half_window + 1;
        if series.len() < window {
            logging::debug(
                Stage::Spike,
                None,
                &format!("{} rows is shorter than the {}-row window", series.len(), window),
            );
            return Detection::empty(Flag::Spike);
        }

        let mask = spike_mask(series.soil_moisture(), &ctx.derivatives().deriv2, &self.config);
        Detection::from_mask(Flag::Spike, &mask)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::smoothed_derivatives;

    fn flat(len: usize, level: f64) -> Vec<Option<f64>> {
        vec![Some(level); len]
    }

    fn flagged_rows(values: &[Option<f64>]) -> Vec<usize> {
        let d = smoothed_derivatives(values);
        let mask = spike_mask(values, &d.deriv2, &SpikeConfig::default());
        (0..mask.len()).filter(|&t| mask[t]).collect()
    }

    #[test]
    fn test_round_to_is_half_even() {
        assert_eq!(round_to(2.0625, 3), 2.062);
        assert_eq!(round_to(2.1875, 3), 2.188);
        assert_eq!(round_to(0.8496, 3), 0.85);
        assert_eq!(round_to(f64::INFINITY, 3), f64::INFINITY);
        assert!(round_to(f64::NAN, 3).is_nan());
    }

    #[test]
    fn test_single_hour_spike_flags_only_the_peak() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(26.2);
        assert_eq!(flagged_rows(&sm), vec![30]);
    }

    #[test]
    fn test_single_hour_dip_is_flagged() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(15.0);
        assert_eq!(flagged_rows(&sm), vec![30]);
    }

    #[test]
    fn test_two_hour_plateau_flags_both_hours() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(25.0);
        sm[31] = Some(25.0);
        assert_eq!(flagged_rows(&sm), vec![30, 31]);
    }

    #[test]
    fn test_plateau_second_hour_comes_from_plateau_disjunct() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(25.0);
        sm[31] = Some(25.0);
        let d = smoothed_derivatives(&sm);
        let criteria = SpikeCriteria::compute(&sm, &d.deriv2, 12);
        let spikes = criteria.spikes(&SpikeConfig::default());

        assert!(spikes[30]);
        assert!(!spikes[31], "row 31 is not a peak of its own neighbourhood");
        assert!(criteria.plateau_end[31]);
        assert_eq!(criteria.shape[30], Some(PeakShape::Plateau));
    }

    #[test]
    fn test_curvature_ratio_reads_previous_over_next() {
        // deriv2[29] = 6.0 and deriv2[31] = 7.25: 6 / 7.25 rounds to 0.828,
        // inside (0.8, 1.2); the inverse, 1.208, would fall outside.
        let mut sm = flat(60, 20.0);
        sm[30] = Some(26.0);
        sm[31] = Some(19.375);
        let d = smoothed_derivatives(&sm);
        assert_eq!(d.deriv2[29], Some(6.0));
        assert_eq!(d.deriv2[31], Some(7.25));

        let c = SpikeCriteria::compute(&sm, &d.deriv2, 12);
        assert_eq!(c.curvature_ratio[30], Some(0.828));
        assert_eq!(flagged_rows(&sm), vec![30]);
    }

    #[test]
    fn test_plateau_at_trailing_edge_flags_row_without_dispersion() {
        // 60 rows, half window 12: row 47 is the last with a full window.
        let mut sm = flat(60, 20.0);
        sm[47] = Some(25.0);
        sm[48] = Some(25.0);
        let d = smoothed_derivatives(&sm);
        let c = SpikeCriteria::compute(&sm, &d.deriv2, 12);

        assert!(c.dispersion[47].is_some());
        assert_eq!(c.dispersion[48], None);
        assert_eq!(flagged_rows(&sm), vec![47, 48], "row 48 comes from the plateau disjunct");
    }

    #[test]
    fn test_small_change_is_not_a_spike() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(22.0); // +10%
        assert!(flagged_rows(&sm).is_empty());
    }

    #[test]
    fn test_step_change_is_not_a_spike() {
        let sm: Vec<Option<f64>> = (0..60)
            .map(|t| Some(if t < 30 { 20.0 } else { 26.0 }))
            .collect();
        assert!(flagged_rows(&sm).is_empty());
    }

    #[test]
    fn test_noisy_neighbourhood_suppresses_spike() {
        // Neighbours swing between 10 and 30: variance/mean is far above 1.
        let mut sm: Vec<Option<f64>> = (0..60)
            .map(|t| Some(if t % 4 < 2 { 10.0 } else { 30.0 }))
            .collect();
        sm[30] = Some(45.0);
        assert!(!flagged_rows(&sm).contains(&30));
    }

    #[test]
    fn test_spike_near_edges_is_not_flagged() {
        let mut sm = flat(60, 20.0);
        sm[5] = Some(26.0);
        sm[55] = Some(26.0);
        assert!(flagged_rows(&sm).is_empty());
    }

    #[test]
    fn test_gap_in_window_suppresses_spike() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(26.2);
        sm[40] = None;
        assert!(flagged_rows(&sm).is_empty());
    }

    #[test]
    fn test_criteria_values_around_spike() {
        let mut sm = flat(60, 20.0);
        sm[30] = Some(25.0);
        let d = smoothed_derivatives(&sm);
        let c = SpikeCriteria::compute(&sm, &d.deriv2, 12);

        assert_eq!(c.abrupt_ratio[30], Some(1.25));
        assert_eq!(c.abrupt_ratio[31], Some(0.8));
        assert_eq!(c.curvature_ratio[30], Some(1.0));
        assert_eq!(c.curvature_ratio[31], Some(f64::INFINITY));
        let calm = c.dispersion[30].expect("full window around row 30");
        assert!(calm.abs() < 1e-9, "flat neighbourhood, got {}", calm);
        assert_eq!(c.dispersion[5], None);
        assert_eq!(c.shape[30], Some(PeakShape::Single));
        assert_eq!(c.abrupt_ratio[0], None);
    }

    #[test]
    fn test_smooth_sine_has_no_spikes() {
        let sm: Vec<Option<f64>> = (0..240)
            .map(|t| Some(25.0 + 5.0 * (t as f64 * std::f64::consts::PI / 12.0).sin()))
            .collect();
        assert!(flagged_rows(&sm).is_empty());
    }

    #[test]
    fn test_detector_skips_short_series() {
        use crate::model::SoilMoistureSeries;
        use chrono::{TimeZone, Utc};

        let mut sm = flat(20, 20.0);
        sm[10] = Some(30.0);
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let s = SoilMoistureSeries::hourly(start, sm);
        let d = SpikeDetector::new(&SpikeConfig::default())
            .evaluate(&FlagContext::new(&s))
            .expect("spike rule has no optional column");
        assert!(d.is_empty());
    }
}
