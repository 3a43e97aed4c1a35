//! P_Risk: downside-risk probability.
//!
//! Over a trailing window of log returns:
//! - VaR: the `var_quantile` quantile of returns (negative in a sell-off)
//! - ATR proxy: trailing high-low range of price
//! - outlier score: z-score of the latest return within the window
//!
//! `combined = standardize(VaR − ATR) + outlier`, and the signal is
//! `sigmoid(λ · combined + bias)`. Deeper VaR and wider ranges pull the
//! signal toward 0.

use serde::{Deserialize, Serialize};

use super::{squash, ProbabilitySignal, SignalInputs};
use crate::math::{log_returns, rolling_quantile, rolling_range, rolling_zscore_of_last, standardize};
use crate::params::{check_open_unit, check_positive, check_window, finite, ParamError};
use crate::series::TimeSeries;

fn default_var_quantile() -> f64 {
    0.05
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProbability {
    pub window: usize,
    pub lambda: f64,
    #[serde(default = "default_var_quantile")]
    pub var_quantile: f64,
    /// Constant added inside the sigmoid. 0.0 is neutral; the unit-bias
    /// variant uses 1.0.
    #[serde(default)]
    pub bias: f64,
}

impl Default for RiskProbability {
    fn default() -> Self {
        Self {
            window: 20,
            lambda: 1.0,
            var_quantile: default_var_quantile(),
            bias: 0.0,
        }
    }
}

/// Intermediate risk components, exposed for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskComponents {
    pub var: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
    pub outlier: Vec<Option<f64>>,
    pub combined: Vec<Option<f64>>,
}

impl RiskProbability {
    pub fn new(window: usize, lambda: f64) -> Self {
        Self {
            window,
            lambda,
            ..Self::default()
        }
    }

    pub fn with_bias(mut self, bias: f64) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_var_quantile(mut self, q: f64) -> Self {
        self.var_quantile = q;
        self
    }

    pub fn components(&self, price: &TimeSeries) -> RiskComponents {
        let returns = log_returns(price);
        let var = rolling_quantile(returns.values(), self.window, self.var_quantile);
        let atr = rolling_range(price.values(), self.window);
        let outlier = rolling_zscore_of_last(returns.values(), self.window);

        let spread: Vec<Option<f64>> = var
            .iter()
            .zip(&atr)
            .map(|(v, a)| Some((*v)? - (*a)?))
            .collect();
        let combined = standardize(&spread)
            .into_iter()
            .zip(&outlier)
            .map(|(z, o)| Some(z? + (*o)?))
            .collect();

        RiskComponents {
            var,
            atr,
            outlier,
            combined,
        }
    }
}

impl ProbabilitySignal for RiskProbability {
    fn name(&self) -> &str {
        "p_risk"
    }

    /// Returns start one period late, so the first full window ends at
    /// index `window`.
    fn warmup_periods(&self) -> usize {
        self.window
    }

    fn validate(&self) -> Result<(), ParamError> {
        check_window("risk.window", self.window)?;
        check_positive("risk.lambda", self.lambda)?;
        check_open_unit("risk.var_quantile", self.var_quantile)?;
        finite("risk.bias", self.bias)
    }

    fn generate(&self, inputs: &SignalInputs<'_>) -> TimeSeries {
        let components = self.components(inputs.price);
        inputs
            .price
            .with_values(squash(&components.combined, self.lambda, self.bias))
    }
}
