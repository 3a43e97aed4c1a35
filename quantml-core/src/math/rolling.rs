//! Trailing-window statistics.
//!
//! Every function is right-aligned: the value at index `i` summarizes
//! `values[i + 1 - window ..= i]`. Positions before the window is full, and
//! windows containing an undefined entry, are undefined. No value at `i`
//! depends on anything after `i`.

use super::{mean, quantile, std_dev, VARIANCE_EPSILON};

/// Collect the trailing window ending at `i` if it is full and fully defined.
fn window_at(values: &[Option<f64>], window: usize, i: usize) -> Option<Vec<f64>> {
    if window == 0 || i + 1 < window {
        return None;
    }
    values[i + 1 - window..=i].iter().copied().collect()
}

fn rolling(
    values: &[Option<f64>],
    window: usize,
    stat: impl Fn(&[f64]) -> Option<f64>,
) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| window_at(values, window, i).and_then(|w| stat(&w)))
        .collect()
}

/// Simple moving average.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, mean)
}

/// The `p`-quantile of each trailing window (linear interpolation).
pub fn rolling_quantile(values: &[Option<f64>], window: usize, p: f64) -> Vec<Option<f64>> {
    rolling(values, window, |w| quantile(w, p))
}

/// `(last - window_mean) / window_std` for each trailing window.
///
/// 0.0 when the window standard deviation is zero or undefined (window of
/// one); still undefined before the window is full.
pub fn rolling_zscore_of_last(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| {
        let last = *w.last()?;
        let m = mean(w)?;
        match std_dev(w) {
            Some(sd) if sd >= VARIANCE_EPSILON => Some((last - m) / sd),
            _ => Some(0.0),
        }
    })
}

/// Trailing max minus trailing min, the high-low range volatility proxy.
pub fn rolling_range(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |w| {
        let hi = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = w.iter().copied().fold(f64::INFINITY, f64::min);
        Some(hi - lo)
    })
}
