//! Property-based tests for the numeric primitives.
//!
//! - sigmoid is strictly increasing, symmetric around 0.5 and stays inside
//!   (0, 1) for every finite input
//! - standardize yields zero mean and unit sample variance, or all zeros
//! - rolling outputs keep input length and their undefined prefix

use proptest::prelude::*;
use quantml_core::math::{
    mean, min_max_normalize, quantile, rolling_mean, rolling_quantile, sigmoid, standardize, std_dev,
    SIGMOID_EPSILON,
};

proptest! {
    #[test]
    fn sigmoid_stays_open_unit(x in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        let y = sigmoid(x);
        prop_assert!(y > 0.0 && y < 1.0, "sigmoid({x}) = {y}");
        prop_assert!(y >= SIGMOID_EPSILON && y <= 1.0 - SIGMOID_EPSILON);
    }

    #[test]
    fn sigmoid_is_symmetric(x in -800.0..800.0_f64) {
        prop_assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sigmoid_is_monotone(a in -10.0..10.0_f64, d in 1e-4..10.0_f64) {
        prop_assert!(sigmoid(a + d) > sigmoid(a));
    }

    #[test]
    fn standardize_moments(values in prop::collection::vec(-1e3..1e3_f64, 2..100)) {
        let opt: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
        let z: Vec<f64> = standardize(&opt).into_iter().map(|v| v.unwrap()).collect();
        prop_assert_eq!(z.len(), values.len());
        let m = mean(&z).unwrap();
        prop_assert!(m.abs() < 1e-9);
        let sd = std_dev(&z).unwrap();
        // zero-variance inputs map to all zeros
        prop_assert!((sd - 1.0).abs() < 1e-9 || z.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn standardize_keeps_undefined(values in prop::collection::vec(prop::option::of(-10.0..10.0_f64), 0..60)) {
        let z = standardize(&values);
        prop_assert_eq!(z.len(), values.len());
        for (a, b) in values.iter().zip(&z) {
            prop_assert_eq!(a.is_none(), b.is_none());
        }
    }

    #[test]
    fn rolling_prefix_is_undefined(
        values in prop::collection::vec(1.0..100.0_f64, 1..80),
        window in 1usize..20,
    ) {
        let opt: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
        for out in [rolling_mean(&opt, window), rolling_quantile(&opt, window, 0.05)] {
            prop_assert_eq!(out.len(), opt.len());
            for (i, v) in out.iter().enumerate() {
                prop_assert_eq!(v.is_some(), i + 1 >= window);
            }
        }
    }

    #[test]
    fn quantile_within_bounds(values in prop::collection::vec(-50.0..50.0_f64, 1..50), p in 0.0..=1.0_f64) {
        let q = quantile(&values, p).unwrap();
        let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(q >= lo - 1e-12 && q <= hi + 1e-12);
    }

    #[test]
    fn min_max_in_unit_interval(values in prop::collection::vec(-1e3..1e3_f64, 1..50)) {
        let opt: Vec<Option<f64>> = values.iter().map(|v| Some(*v)).collect();
        for v in min_max_normalize(&opt).into_iter().flatten() {
            prop_assert!((0.0..=1.0).contains(&v));
        }
    }
}

#[test]
fn sigmoid_fixed_points() {
    assert_eq!(sigmoid(0.0), 0.5);
    assert_eq!(sigmoid(1e6), 1.0 - SIGMOID_EPSILON);
    assert_eq!(sigmoid(-1e6), SIGMOID_EPSILON);
    assert_eq!(sigmoid(f64::INFINITY), 1.0 - SIGMOID_EPSILON);
    assert!(sigmoid(f64::NAN).is_nan());
}
