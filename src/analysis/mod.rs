/// Derived-series computations shared by the detectors.
///
/// Everything here is a pure function of an input column and returns a
/// series of the same length, aligned index-for-index with the input.
///
/// Submodules:
/// - `derivatives` — Savitzky–Golay first and second derivatives.
/// - `rolling` — lag differences, trailing rolling std/sum, and centered
///   neighbour statistics.

pub mod derivatives;
pub mod rolling;

pub use derivatives::{smoothed_derivatives, Derivatives};
