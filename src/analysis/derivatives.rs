//! Smoothed first and second derivatives of the soil-moisture series.
//!
//! A Savitzky–Golay filter with a 3-sample window and a degree-2 polynomial.
//! With three points the quadratic fit is exact, so the filter reduces to
//! fixed convolution coefficients evaluated at the window center.
//!
//! Edges use "nearest" extension: the first and last samples are repeated
//! outward, so the output is always as long as the input.

/// Coefficients for the first derivative at the window center.
const FIRST_DERIVATIVE: [f64; 3] = [-0.5, 0.0, 0.5];

/// Coefficients for the second derivative at the window center.
const SECOND_DERIVATIVE: [f64; 3] = [1.0, -2.0, 1.0];

/// First (`deriv1`) and second (`deriv2`) smoothed derivatives, both
/// index-aligned with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives {
    pub deriv1: Vec<Option<f64>>,
    pub deriv2: Vec<Option<f64>>,
}

/// Computes both derivatives in one pass.
///
/// A window that contains a missing sample yields a missing derivative,
/// so an entirely missing input gives an entirely missing output.
pub fn smoothed_derivatives(values: &[Option<f64>]) -> Derivatives {
    let n = values.len();
    let mut deriv1 = Vec::with_capacity(n);
    let mut deriv2 = Vec::with_capacity(n);

    for t in 0..n {
        let window = [
            values[t.saturating_sub(1)],
            values[t],
            values[(t + 1).min(n - 1)],
        ];
        deriv1.push(apply(&FIRST_DERIVATIVE, &window));
        deriv2.push(apply(&SECOND_DERIVATIVE, &window));
    }

    Derivatives { deriv1, deriv2 }
}

fn apply(coefficients: &[f64; 3], window: &[Option<f64>; 3]) -> Option<f64> {
    coefficients
        .iter()
        .zip(window)
        .map(|(c, v)| v.map(|x| c * x))
        .sum()
}
