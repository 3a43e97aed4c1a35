//! P_Econ: macro divergence probability.
//!
//! GDP and an interest rate are brought onto the price axis (GDP by linear
//! interpolation, the rate by forward fill), then
//! `sigmoid(λ · standardize(GDP − Rate))`.

use serde::{Deserialize, Serialize};

use super::{squash, ProbabilitySignal, SignalInputs};
use crate::math::standardize;
use crate::params::{check_positive, ParamError};
use crate::series::{resample_to, zip_with, Resample, TimeSeries};

fn default_gdp_resample() -> Resample {
    Resample::Linear
}

fn default_rate_resample() -> Resample {
    Resample::ForwardFill
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconProbability {
    pub lambda: f64,
    #[serde(default = "default_gdp_resample")]
    pub gdp_resample: Resample,
    #[serde(default = "default_rate_resample")]
    pub rate_resample: Resample,
}

impl Default for EconProbability {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            gdp_resample: default_gdp_resample(),
            rate_resample: default_rate_resample(),
        }
    }
}

impl EconProbability {
    pub fn new(lambda: f64) -> Self {
        Self {
            lambda,
            ..Self::default()
        }
    }

    /// `GDP − Rate` on the price axis.
    pub fn spread(&self, inputs: &SignalInputs<'_>) -> TimeSeries {
        let axis = inputs.price.dates();
        let (Some(gdp), Some(rate)) = (inputs.gdp, inputs.rate) else {
            return inputs.price.with_values(vec![None; axis.len()]);
        };
        let gdp = resample_to(gdp, axis, self.gdp_resample);
        let rate = resample_to(rate, axis, self.rate_resample);
        zip_with(&gdp, &rate, |g, r| g - r)
    }
}

impl ProbabilitySignal for EconProbability {
    fn name(&self) -> &str {
        "p_econ"
    }

    fn warmup_periods(&self) -> usize {
        0
    }

    fn validate(&self) -> Result<(), ParamError> {
        check_positive("econ.lambda", self.lambda)
    }

    fn generate(&self, inputs: &SignalInputs<'_>) -> TimeSeries {
        let spread = self.spread(inputs);
        let z = standardize(spread.values());
        spread.with_values(squash(&z, self.lambda, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{assert_approx, sigmoid, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn monthly_price() -> TimeSeries {
        let pairs: Vec<(NaiveDate, f64)> = (1..=7).map(|m| (d(2024, m), 100.0 + m as f64)).collect();
        TimeSeries::from_pairs(&pairs).unwrap()
    }

    #[test]
    fn interpolates_gdp_and_fills_rate() {
        let price = monthly_price();
        let gdp = TimeSeries::from_pairs(&[(d(2024, 1), 100.0), (d(2024, 4), 130.0), (d(2024, 7), 130.0)]).unwrap();
        let rate = TimeSeries::from_pairs(&[(d(2024, 1), 5.0), (d(2024, 5), 4.0)]).unwrap();
        let p = EconProbability::new(1.0);
        let spread = p.spread(&SignalInputs::with_macro(&price, &gdp, &rate));

        assert_eq!(spread.len(), 7);
        assert_approx(spread.get(0).unwrap(), 95.0, DEFAULT_EPSILON);
        // Feb 1 is 31 of 91 days between Jan 1 and Apr 1.
        assert_approx(spread.get(1).unwrap(), 100.0 + 30.0 * 31.0 / 91.0 - 5.0, DEFAULT_EPSILON);
        assert_approx(spread.get(3).unwrap(), 125.0, DEFAULT_EPSILON);
        assert_approx(spread.get(4).unwrap(), 126.0, DEFAULT_EPSILON);
    }

    #[test]
    fn signal_is_sigmoid_of_standardized_spread() {
        let price = monthly_price();
        let gdp = TimeSeries::from_pairs(&[(d(2024, 1), 100.0), (d(2024, 7), 160.0)]).unwrap();
        let rate = TimeSeries::from_pairs(&[(d(2024, 1), 5.0)]).unwrap();
        let p = EconProbability::new(0.5);
        let inputs = SignalInputs::with_macro(&price, &gdp, &rate);
        let spread = p.spread(&inputs);
        let z = standardize(spread.values());
        let signal = p.generate(&inputs);
        for i in 0..7 {
            assert_approx(signal.get(i).unwrap(), sigmoid(0.5 * z[i].unwrap()), DEFAULT_EPSILON);
        }
        // Rising GDP with flat rates: the latest reading is the most bullish.
        assert!(signal.get(6).unwrap() > signal.get(0).unwrap());
    }

    #[test]
    fn dates_before_macro_history_are_undefined() {
        let price = monthly_price();
        let gdp = TimeSeries::from_pairs(&[(d(2024, 3), 100.0), (d(2024, 6), 110.0)]).unwrap();
        let rate = TimeSeries::from_pairs(&[(d(2024, 1), 5.0)]).unwrap();
        let signal = EconProbability::new(1.0).generate(&SignalInputs::with_macro(&price, &gdp, &rate));
        assert_eq!(signal.get(0), None);
        assert_eq!(signal.get(1), None);
        assert!(signal.get(2).is_some());
    }

    #[test]
    fn missing_macro_inputs_give_no_signal() {
        let price = monthly_price();
        let signal = EconProbability::new(1.0).generate(&SignalInputs::price_only(&price));
        assert_eq!(signal.len(), 7);
        assert_eq!(signal.defined_count(), 0);
    }

    #[test]
    fn validate_lambda() {
        assert!(EconProbability::new(1.0).validate().is_ok());
        assert!(EconProbability::new(0.0).validate().is_err());
    }
}
