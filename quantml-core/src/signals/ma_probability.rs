//! P_MA: moving-average spread probability.
//!
//! `sigmoid(λ · standardize(SMA_short − SMA_long))`. A short average pulling
//! above the long one pushes the signal toward 1.

use serde::{Deserialize, Serialize};

use super::{squash, ProbabilitySignal, SignalInputs};
use crate::math::{rolling_mean, standardize};
use crate::params::{check_positive, check_window, ParamError};
use crate::series::TimeSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaProbability {
    pub short_window: usize,
    pub long_window: usize,
    pub lambda: f64,
}

impl Default for MaProbability {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            lambda: 1.0,
        }
    }
}

impl MaProbability {
    pub fn new(short_window: usize, long_window: usize, lambda: f64) -> Self {
        Self {
            short_window,
            long_window,
            lambda,
        }
    }

    /// Raw `SMA_short − SMA_long`, undefined until the long window is full.
    pub fn spread(&self, price: &TimeSeries) -> TimeSeries {
        let short = rolling_mean(price.values(), self.short_window);
        let long = rolling_mean(price.values(), self.long_window);
        let diff = short
            .into_iter()
            .zip(long)
            .map(|(s, l)| Some(s? - l?))
            .collect();
        price.with_values(diff)
    }
}

impl ProbabilitySignal for MaProbability {
    fn name(&self) -> &str {
        "p_ma"
    }

    fn warmup_periods(&self) -> usize {
        self.long_window.saturating_sub(1)
    }

    fn validate(&self) -> Result<(), ParamError> {
        check_window("ma.short_window", self.short_window)?;
        check_window("ma.long_window", self.long_window)?;
        if self.short_window >= self.long_window {
            return Err(ParamError::WindowOrder {
                short: self.short_window,
                long: self.long_window,
            });
        }
        check_positive("ma.lambda", self.lambda)
    }

    fn generate(&self, inputs: &SignalInputs<'_>) -> TimeSeries {
        let spread = self.spread(inputs.price);
        let z = standardize(spread.values());
        inputs.price.with_values(squash(&z, self.lambda, 0.0))
    }
}
