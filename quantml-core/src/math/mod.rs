//! Numeric primitives shared by the signal generators.
//!
//! All functions work on `&[Option<f64>]` so that undefined entries flow
//! through unchanged. Output vectors have the same length as their input.

pub mod returns;
pub mod rolling;

pub use returns::{log_returns, simple_returns, ReturnSpace};
pub use rolling::{rolling_mean, rolling_quantile, rolling_range, rolling_zscore_of_last};

/// Smallest and largest values `sigmoid` may return are `SIGMOID_EPSILON`
/// and `1 - SIGMOID_EPSILON`.
pub const SIGMOID_EPSILON: f64 = 1e-12;

/// Standard deviations below this are treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-15;

/// Logistic transform `1 / (1 + e^-x)`, saturating inside `(0, 1)`.
///
/// Evaluated branch-wise so `exp` never overflows, then clamped to
/// `[SIGMOID_EPSILON, 1 - SIGMOID_EPSILON]`. NaN maps to NaN.
pub fn sigmoid(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let raw = if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    };
    raw.clamp(SIGMOID_EPSILON, 1.0 - SIGMOID_EPSILON)
}

/// Arithmetic mean of a slice; `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// The `p`-quantile with linear interpolation between order statistics.
///
/// `p` is clamped into `[0, 1]`; `None` when `values` is empty.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Z-score every defined entry against the mean and sample standard
/// deviation of all defined entries.
///
/// Undefined entries stay undefined. When fewer than two values are defined
/// or the standard deviation is zero, every defined entry becomes 0.0.
pub fn standardize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    let m = mean(&defined).unwrap_or(0.0);
    let sd = std_dev(&defined).unwrap_or(0.0);
    values
        .iter()
        .map(|v| {
            v.map(|x| {
                if sd < VARIANCE_EPSILON {
                    0.0
                } else {
                    (x - m) / sd
                }
            })
        })
        .collect()
}

/// Scale defined entries into `[0, 1]` by the observed min and max.
///
/// A constant series maps to all zeros.
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined = values.iter().flatten().copied();
    let (lo, hi) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    values
        .iter()
        .map(|v| v.map(|x| if hi > lo { (x - lo) / (hi - lo) } else { 0.0 }))
        .collect()
}

#[cfg(test)]
pub(crate) fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub(crate) const DEFAULT_EPSILON: f64 = 1e-10;
