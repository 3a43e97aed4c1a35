//! Dated series with explicit "undefined" entries.
//!
//! A `TimeSeries` holds one optional value per calendar period. `None` marks
//! a period with no value (warmup, missing data, degenerate statistic) and is
//! kept distinct from every real number, including 0.0 and 0.5.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while constructing a series.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("dates and values differ in length ({dates} dates, {values} values)")]
    LengthMismatch { dates: usize, values: usize },

    #[error("timestamps must be strictly increasing: {previous} is followed by {next}")]
    NotIncreasing { previous: NaiveDate, next: NaiveDate },
}

/// An ordered sequence of `(date, Option<value>)` pairs with strictly
/// increasing dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Build a series, rejecting unsorted or duplicate dates.
    ///
    /// Non-finite values are stored as undefined.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        for w in dates.windows(2) {
            if w[1] <= w[0] {
                return Err(SeriesError::NotIncreasing {
                    previous: w[0],
                    next: w[1],
                });
            }
        }
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Ok(Self { dates, values })
    }

    /// Build a fully defined series from `(date, value)` pairs.
    pub fn from_pairs(pairs: &[(NaiveDate, f64)]) -> Result<Self, SeriesError> {
        let dates = pairs.iter().map(|(d, _)| *d).collect();
        let values = pairs.iter().map(|(_, v)| Some(*v)).collect();
        Self::new(dates, values)
    }

    /// Same dates, new values. The caller guarantees equal length.
    pub(crate) fn with_values(&self, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.dates.len());
        Self {
            dates: self.dates.clone(),
            values: values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Value at a position; `None` if out of range or undefined.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// Value on a date; `None` if the date is absent or the value undefined.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .and_then(|i| self.values[i])
    }

    /// Number of defined entries.
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Index of the first defined entry.
    pub fn first_defined(&self) -> Option<usize> {
        self.values.iter().position(|v| v.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Apply `f` to every defined value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        self.with_values(self.values.iter().map(|v| v.map(&f)).collect())
    }

    /// Restrict to dates within `[start, end]`.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let (dates, values) = self
            .iter()
            .filter(|(d, _)| *d >= start && *d <= end)
            .unzip();
        Self { dates, values }
    }
}

/// Keep only timestamps present in both series.
///
/// Returns the common dates with the values of each side; an empty result
/// means the series are misaligned.
pub fn inner_join(a: &TimeSeries, b: &TimeSeries) -> (Vec<NaiveDate>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut dates = Vec::new();
    let mut left = Vec::new();
    let mut right = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a.dates[i].cmp(&b.dates[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dates.push(a.dates[i]);
                left.push(a.values[i]);
                right.push(b.values[j]);
                i += 1;
                j += 1;
            }
        }
    }
    (dates, left, right)
}

/// Combine two series on their common timestamps.
///
/// `f` is applied only where both sides are defined; every other common
/// timestamp is undefined.
pub fn zip_with(a: &TimeSeries, b: &TimeSeries, f: impl Fn(f64, f64) -> f64) -> TimeSeries {
    let (dates, left, right) = inner_join(a, b);
    let values = left
        .into_iter()
        .zip(right)
        .map(|(l, r)| match (l, r) {
            (Some(l), Some(r)) => Some(f(l, r)),
            _ => None,
        })
        .collect();
    TimeSeries::new(dates, values).unwrap_or_default()
}

/// How a low-frequency series is brought onto a denser date axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    /// Time-weighted linear interpolation between bracketing observations.
    /// Past the last observation the last value is carried forward.
    Linear,
    /// Last observation at or before the target date.
    ForwardFill,
}

/// Resample `series` onto `target` dates.
///
/// Target dates before the first defined observation are undefined.
/// Undefined source entries are ignored.
pub fn resample_to(series: &TimeSeries, target: &[NaiveDate], method: Resample) -> TimeSeries {
    let known: Vec<(NaiveDate, f64)> = series
        .iter()
        .filter_map(|(d, v)| v.map(|v| (d, v)))
        .collect();

    let exact: HashMap<NaiveDate, f64> = known.iter().copied().collect();
    let mut values = Vec::with_capacity(target.len());

    for &date in target {
        if let Some(v) = exact.get(&date) {
            values.push(Some(*v));
            continue;
        }
        // Index of the first observation strictly after `date`.
        let after = known.partition_point(|(d, _)| *d <= date);
        if after == 0 {
            values.push(None);
            continue;
        }
        let (d0, v0) = known[after - 1];
        let value = match (method, known.get(after)) {
            (Resample::Linear, Some(&(d1, v1))) => {
                let span = (d1 - d0).num_days() as f64;
                let offset = (date - d0).num_days() as f64;
                v0 + (v1 - v0) * offset / span
            }
            _ => v0,
        };
        values.push(Some(value));
    }

    TimeSeries::new(target.to_vec(), values).unwrap_or_default()
}

#[cfg(test)]
pub(crate) fn test_dates(n: usize) -> Vec<NaiveDate> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    (0..n)
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect()
}

#[cfg(test)]
pub(crate) fn series_of(values: &[f64]) -> TimeSeries {
    TimeSeries::new(test_dates(values.len()), values.iter().map(|v| Some(*v)).collect()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn rejects_unsorted_dates() {
        let err = TimeSeries::new(vec![d("2024-01-02"), d("2024-01-01")], vec![Some(1.0), Some(2.0)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { .. }));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let err = TimeSeries::new(vec![d("2024-01-01"), d("2024-01-01")], vec![Some(1.0), Some(2.0)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { .. }));
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = TimeSeries::new(vec![d("2024-01-01")], vec![]).unwrap_err();
        assert_eq!(err, SeriesError::LengthMismatch { dates: 1, values: 0 });
    }

    #[test]
    fn nan_is_stored_as_undefined() {
        let s = TimeSeries::new(vec![d("2024-01-01")], vec![Some(f64::NAN)]).unwrap();
        assert_eq!(s.get(0), None);
        assert_eq!(s.defined_count(), 0);
    }

    #[test]
    fn inner_join_drops_unmatched() {
        let a = TimeSeries::from_pairs(&[(d("2024-01-01"), 1.0), (d("2024-01-02"), 2.0), (d("2024-01-04"), 4.0)])
            .unwrap();
        let b = TimeSeries::from_pairs(&[(d("2024-01-02"), 20.0), (d("2024-01-03"), 30.0), (d("2024-01-04"), 40.0)])
            .unwrap();
        let (dates, l, r) = inner_join(&a, &b);
        assert_eq!(dates, vec![d("2024-01-02"), d("2024-01-04")]);
        assert_eq!(l, vec![Some(2.0), Some(4.0)]);
        assert_eq!(r, vec![Some(20.0), Some(40.0)]);
    }

    #[test]
    fn zip_with_propagates_undefined() {
        let a = TimeSeries::new(vec![d("2024-01-01"), d("2024-01-02")], vec![None, Some(2.0)]).unwrap();
        let b = series_of(&[10.0, 20.0]);
        let c = zip_with(&a, &b, |x, y| x + y);
        assert_eq!(c.values(), &[None, Some(22.0)]);
    }

    #[test]
    fn zip_with_disjoint_is_empty() {
        let a = TimeSeries::from_pairs(&[(d("2024-01-01"), 1.0)]).unwrap();
        let b = TimeSeries::from_pairs(&[(d("2024-02-01"), 1.0)]).unwrap();
        assert!(zip_with(&a, &b, |x, y| x * y).is_empty());
    }

    #[test]
    fn linear_resample_quarterly_to_monthly() {
        let gdp = TimeSeries::from_pairs(&[(d("2024-01-01"), 100.0), (d("2024-04-01"), 191.0)]).unwrap();
        let target = vec![d("2023-12-01"), d("2024-01-01"), d("2024-02-01"), d("2024-04-01"), d("2024-05-01")];
        let m = resample_to(&gdp, &target, Resample::Linear);
        assert_eq!(m.get(0), None);
        assert_eq!(m.get(1), Some(100.0));
        // Jan 1 -> Apr 1 is 91 days; Feb 1 is 31 days in.
        assert!((m.get(2).unwrap() - 131.0).abs() < 1e-9);
        assert_eq!(m.get(3), Some(191.0));
        assert_eq!(m.get(4), Some(191.0));
    }

    #[test]
    fn forward_fill_resample() {
        let rate = TimeSeries::from_pairs(&[(d("2024-01-01"), 5.0), (d("2024-02-01"), 5.25)]).unwrap();
        let target = vec![d("2024-01-15"), d("2024-02-01"), d("2024-02-20")];
        let r = resample_to(&rate, &target, Resample::ForwardFill);
        assert_eq!(r.values(), &[Some(5.0), Some(5.25), Some(5.25)]);
    }

    #[test]
    fn value_on_and_slice() {
        let s = series_of(&[1.0, 2.0, 3.0]);
        let dates = s.dates().to_vec();
        assert_eq!(s.value_on(dates[1]), Some(2.0));
        let sliced = s.slice_dates(dates[1], dates[2]);
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.get(0), Some(2.0));
    }
}
