//! Local peak classification over a 3–4 sample neighbourhood.
//!
//! The neighbourhood `[a, b, c, d]` is reduced to the directions of its
//! steps (a→b, b→c, c→d) and matched against two shapes:
//!
//! ```text
//! single peak     a < b > c   or   a > b < c
//! plateau peak    a < b = c > d   or   a > b = c < d
//! ```
//!
//! Comparisons are strict, so a tie never forms a single peak. A missing
//! sample makes every step that touches it unknown.

/// Outcome of classifying one neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakShape {
    NoPeak,
    /// The second sample is a strict local maximum or minimum.
    Single,
    /// The second and third samples are equal and together form a maximum
    /// or minimum.
    Plateau,
}

impl PeakShape {
    pub fn is_peak(self) -> bool {
        self != PeakShape::NoPeak
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Up,
    Down,
    Level,
    Unknown,
}

fn step(from: Option<f64>, to: Option<f64>) -> Step {
    match (from, to) {
        (Some(a), Some(b)) if a < b => Step::Up,
        (Some(a), Some(b)) if a > b => Step::Down,
        (Some(a), Some(b)) if a == b => Step::Level,
        _ => Step::Unknown,
    }
}

/// Classifies a neighbourhood of three or four samples.
///
/// Shorter slices are `NoPeak`; samples past the fourth are ignored.
pub fn classify(window: &[Option<f64>]) -> PeakShape {
    if window.len() < 3 {
        return PeakShape::NoPeak;
    }
    let first = step(window[0], window[1]);
    let second = step(window[1], window[2]);
    let third = window.get(3).map_or(Step::Unknown, |&d| step(window[2], d));

    match (first, second, third) {
        (Step::Up, Step::Down, _) | (Step::Down, Step::Up, _) => PeakShape::Single,
        (Step::Up, Step::Level, Step::Down) | (Step::Down, Step::Level, Step::Up) => PeakShape::Plateau,
        _ => PeakShape::NoPeak,
    }
}

/// Peak shape attributed to each row `t`, classifying `[t-1, t, t+1, t+2]`.
///
/// The neighbourhood is clipped at the series edges and needs at least three
/// valid samples; otherwise the row has no classification.
pub fn peak_shapes(values: &[Option<f64>]) -> Vec<Option<PeakShape>> {
    let n = values.len();
    (0..n)
        .map(|t| {
            let lo = t.saturating_sub(1);
            let hi = (t + 2).min(n - 1);
            let window = &values[lo..=hi];
            let valid = window.iter().filter(|v| v.is_some()).count();
            (valid >= 3).then(|| classify(window))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_single_maximum_and_minimum() {
        assert_eq!(classify(&w(&[1.0, 3.0, 2.0])), PeakShape::Single);
        assert_eq!(classify(&w(&[3.0, 1.0, 2.0])), PeakShape::Single);
        assert_eq!(classify(&w(&[1.0, 3.0, 2.0, 9.0])), PeakShape::Single);
    }

    #[test]
    fn test_ties_are_not_single_peaks() {
        assert_eq!(classify(&w(&[1.0, 3.0, 3.0])), PeakShape::NoPeak);
        assert_eq!(classify(&w(&[3.0, 3.0, 1.0, 0.0])), PeakShape::NoPeak);
    }

    #[test]
    fn test_two_sample_plateau() {
        assert_eq!(classify(&w(&[1.0, 3.0, 3.0, 1.0])), PeakShape::Plateau);
        assert_eq!(classify(&w(&[5.0, 2.0, 2.0, 4.0])), PeakShape::Plateau);
        // Plateau needs the fourth sample to close it.
        assert_eq!(classify(&w(&[1.0, 3.0, 3.0, 4.0])), PeakShape::NoPeak);
        assert_eq!(classify(&w(&[1.0, 3.0, 3.0])), PeakShape::NoPeak);
    }

    #[test]
    fn test_monotonic_is_no_peak() {
        assert_eq!(classify(&w(&[1.0, 2.0, 3.0, 4.0])), PeakShape::NoPeak);
        assert_eq!(classify(&w(&[4.0, 3.0, 2.0, 1.0])), PeakShape::NoPeak);
    }

    #[test]
    fn test_missing_sample_breaks_pattern() {
        assert_eq!(classify(&[Some(1.0), None, Some(1.0)]), PeakShape::NoPeak);
        assert_eq!(
            classify(&[Some(1.0), Some(3.0), Some(3.0), None]),
            PeakShape::NoPeak
        );
    }

    #[test]
    fn test_peak_shapes_align_to_second_sample() {
        let values = w(&[20.0, 20.0, 25.0, 20.0, 20.0, 20.0]);
        let shapes = peak_shapes(&values);
        assert_eq!(shapes.len(), values.len());
        assert_eq!(shapes[2], Some(PeakShape::Single));
        assert_eq!(shapes[1], Some(PeakShape::NoPeak));
        assert_eq!(shapes[3], Some(PeakShape::NoPeak));
        // Last row has only two samples in its neighbourhood.
        assert_eq!(shapes[5], None);
    }

    #[test]
    fn test_peak_shapes_plateau_attributed_to_first_elevated_row() {
        let values = w(&[20.0, 20.0, 25.0, 25.0, 20.0, 20.0]);
        let shapes = peak_shapes(&values);
        assert_eq!(shapes[2], Some(PeakShape::Plateau));
        assert_eq!(shapes[3], Some(PeakShape::NoPeak));
    }

    #[test]
    fn test_peak_shapes_need_three_valid_samples() {
        let values = vec![Some(1.0), None, Some(3.0), None, Some(1.0)];
        let shapes = peak_shapes(&values);
        assert_eq!(shapes[1], None, "[1.0, None, 3.0, None] has two valid samples");
        assert_eq!(shapes[2], None);
    }

    #[test]
    fn test_peak_shapes_empty_input() {
        assert!(peak_shapes(&[]).is_empty());
    }
}
