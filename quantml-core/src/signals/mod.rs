//! Probability-like signals.
//!
//! Each generator squashes a standardized market or macro spread through a
//! sigmoid, producing a series in `(0, 1)`. Values above 0.5 lean long,
//! below 0.5 lean short. Periods without enough history are undefined,
//! never 0.0 or 0.5.

pub mod econ_probability;
pub mod ma_probability;
pub mod risk_probability;

pub use econ_probability::EconProbability;
pub use ma_probability::MaProbability;
pub use risk_probability::RiskProbability;

use serde::{Deserialize, Serialize};

use crate::params::ParamError;
use crate::series::TimeSeries;

/// Raw series a generator may draw from.
///
/// The price axis is the reference axis: every generator returns a series
/// on `price.dates()`.
#[derive(Debug, Clone, Copy)]
pub struct SignalInputs<'a> {
    pub price: &'a TimeSeries,
    pub gdp: Option<&'a TimeSeries>,
    pub rate: Option<&'a TimeSeries>,
}

impl<'a> SignalInputs<'a> {
    pub fn price_only(price: &'a TimeSeries) -> Self {
        Self {
            price,
            gdp: None,
            rate: None,
        }
    }

    pub fn with_macro(price: &'a TimeSeries, gdp: &'a TimeSeries, rate: &'a TimeSeries) -> Self {
        Self {
            price,
            gdp: Some(gdp),
            rate: Some(rate),
        }
    }
}

/// A generator of a sigmoid-bounded signal.
///
/// # Look-ahead
/// Rolling inputs at period t use data through t only. The final
/// standardization step uses the full provided history, so callers wanting
/// a strictly out-of-sample signal must truncate the inputs first.
pub trait ProbabilitySignal: Send + Sync {
    /// Short name used in exports (e.g., "p_ma").
    fn name(&self) -> &str;

    /// Number of leading periods that are always undefined.
    fn warmup_periods(&self) -> usize;

    /// Check every parameter against its domain.
    fn validate(&self) -> Result<(), ParamError>;

    /// Compute the signal on the price axis.
    fn generate(&self, inputs: &SignalInputs<'_>) -> TimeSeries;
}

/// The three generated signals of one parameter set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSet {
    pub p_ma: TimeSeries,
    pub p_risk: TimeSeries,
    /// Absent when no macro series were supplied.
    pub p_econ: Option<TimeSeries>,
}

/// Parameters of all three generators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalParams {
    #[serde(default)]
    pub ma: MaProbability,
    #[serde(default)]
    pub risk: RiskProbability,
    #[serde(default)]
    pub econ: EconProbability,
}

impl SignalParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        self.ma.validate()?;
        self.risk.validate()?;
        self.econ.validate()
    }

    /// Run every generator. P_Econ is produced only when both macro series
    /// are present.
    pub fn generate(&self, inputs: &SignalInputs<'_>) -> SignalSet {
        let p_econ = match (inputs.gdp, inputs.rate) {
            (Some(_), Some(_)) => Some(self.econ.generate(inputs)),
            _ => None,
        };
        SignalSet {
            p_ma: self.ma.generate(inputs),
            p_risk: self.risk.generate(inputs),
            p_econ,
        }
    }
}

/// `sigmoid(scale * x + bias)` over every defined entry.
pub(crate) fn squash(values: &[Option<f64>], scale: f64, bias: f64) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|v| v.map(|x| crate::math::sigmoid(scale * x + bias)))
        .collect()
}
