//! Sliding-window statistics over index-aligned series.
//!
//! Every function returns a vector with exactly one entry per input sample.
//! Missing samples are skipped inside a window; an entry is `None` wherever
//! the window does not hold enough valid samples to define the statistic.

/// Running count, mean and sum of squared deviations that supports both
/// adding and removing samples (Welford, with the inverse update for removal).
#[derive(Debug, Clone, Default)]
struct RollingMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RollingMoments {
    fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        if self.count <= 1 {
            *self = Self::default();
            return;
        }
        self.count -= 1;
        let delta = x - self.mean;
        self.mean -= delta / self.count as f64;
        self.m2 -= delta * (x - self.mean);
        // Cancellation can leave a tiny negative residue.
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    /// Sample variance (ddof = 1); undefined below two samples.
    fn sample_variance(&self) -> Option<f64> {
        if self.count < 2 {
            None
        } else {
            Some(self.m2 / (self.count - 1) as f64)
        }
    }
}

/// Non-finite samples count as missing.
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|x| x.is_finite())
}

/// Lag difference: `out[t] = values[t] - values[t - lag]`.
///
/// `None` for the first `lag` samples and wherever either operand is missing.
pub fn diff(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(t, current)| {
            if t < lag {
                return None;
            }
            Some(finite(*current)? - finite(values[t - lag])?)
        })
        .collect()
}

/// Sample standard deviation over the trailing window `[t - window + 1, t]`.
///
/// Windows near the start are shorter and still produce a value as long as
/// they hold `min_periods` valid samples. A single valid sample never has a
/// defined deviation.
pub fn rolling_std(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let mut moments = RollingMoments::default();
    let mut out = Vec::with_capacity(values.len());

    for (t, value) in values.iter().enumerate() {
        if let Some(x) = finite(*value) {
            moments.add(x);
        }
        if t >= window {
            if let Some(old) = finite(values[t - window]) {
                moments.remove(old);
            }
        }

        if moments.count >= min_periods.max(1) {
            out.push(moments.sample_variance().map(f64::sqrt));
        } else {
            out.push(None);
        }
    }

    out
}

/// Sum of the valid samples in the trailing window `[t - window + 1, t]`.
///
/// Each window is summed afresh, so rounding from samples that have already
/// left the window never carries into later totals.
pub fn rolling_sum(values: &[Option<f64>], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|t| {
            let lo = (t + 1).saturating_sub(window);
            let (count, sum) = values[lo..=t]
                .iter()
                .filter_map(|v| finite(*v))
                .fold((0usize, 0.0), |(count, sum), x| (count + 1, sum + x));
            (count >= min_periods.max(1)).then_some(sum)
        })
        .collect()
}

/// Mean and sample variance of the neighbours of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighbourStats {
    pub mean: f64,
    pub variance: f64,
}

/// Statistics of the `2 * half` samples surrounding `t` (window
/// `[t - half, t + half]` with the center left out).
///
/// Defined only where the full window, center included, is present; the
/// first and last `half` samples are always `None`.
pub fn centered_neighbour_stats(values: &[Option<f64>], half: usize) -> Vec<Option<NeighbourStats>> {
    let width = 2 * half + 1;
    let mut out = vec![None; values.len()];
    if values.len() < width {
        return out;
    }

    let mut window = RollingMoments::default();
    for (i, value) in values.iter().enumerate() {
        if let Some(x) = finite(*value) {
            window.add(x);
        }
        if i >= width {
            if let Some(old) = finite(values[i - width]) {
                window.remove(old);
            }
        }
        if i + 1 < width || window.count < width {
            continue;
        }

        let center = i - half;
        if let Some(c) = finite(values[center]) {
            let mut neighbours = window.clone();
            neighbours.remove(c);
            out[center] = neighbours.sample_variance().map(|variance| NeighbourStats {
                mean: neighbours.mean,
                variance,
            });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
