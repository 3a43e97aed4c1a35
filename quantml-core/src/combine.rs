//! Linear blends of generated signals into one composite score.
//!
//! Blends are evaluated only on timestamps where every input is present
//! (inner join); a timestamp where any input is undefined stays undefined.

use serde::{Deserialize, Serialize};

use crate::params::{check_unit, ParamError};
use crate::series::{zip_with, TimeSeries};
use crate::signals::SignalSet;

/// `w1·P_MA + w2·P_Risk`.
pub fn technical(p_ma: &TimeSeries, p_risk: &TimeSeries, w1: f64, w2: f64) -> TimeSeries {
    zip_with(p_ma, p_risk, |m, r| w1 * m + w2 * r)
}

/// `α·f_technical + (1 − α)·P_Econ`.
pub fn hybrid(f_technical: &TimeSeries, p_econ: &TimeSeries, alpha: f64) -> TimeSeries {
    zip_with(f_technical, p_econ, |t, e| alpha * t + (1.0 - alpha) * e)
}

/// `w1·P_MA + w2·P_Risk + w3·P_Econ`. The weights need not sum to 1.
pub fn weighted(
    p_ma: &TimeSeries,
    p_risk: &TimeSeries,
    p_econ: &TimeSeries,
    w1: f64,
    w2: f64,
    w3: f64,
) -> TimeSeries {
    zip_with(&technical(p_ma, p_risk, w1, w2), p_econ, |t, e| t + w3 * e)
}

/// Map a composite of `(0, 1)` signals onto a zero-centered score:
/// `2f − 1`. Undefined entries stay undefined.
///
/// Symmetric `±T` decisions and negative continuous exposure need a
/// centered composite; the raw blends never go below zero.
pub fn center(composite: &TimeSeries) -> TimeSeries {
    composite.map(|f| 2.0 * f - 1.0)
}

/// Which combination of signals feeds the decision layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Blend {
    /// Price-only composite.
    Technical { w_ma: f64, w_risk: f64 },

    /// Technical composite blended with the macro signal.
    Hybrid { w_ma: f64, w_risk: f64, alpha: f64 },

    /// Direct three-weight form used by the raw grid search.
    Weighted { w_ma: f64, w_risk: f64, w_econ: f64 },
}

impl Default for Blend {
    fn default() -> Self {
        Self::Technical {
            w_ma: 0.5,
            w_risk: 0.5,
        }
    }
}

impl Blend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Technical { .. } => "technical",
            Self::Hybrid { .. } => "hybrid",
            Self::Weighted { .. } => "weighted",
        }
    }

    /// Whether this blend consumes P_Econ.
    pub fn needs_econ(&self) -> bool {
        !matches!(self, Self::Technical { .. })
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        match *self {
            Self::Technical { w_ma, w_risk } => {
                check_unit("blend.w_ma", w_ma)?;
                check_unit("blend.w_risk", w_risk)
            }
            Self::Hybrid { w_ma, w_risk, alpha } => {
                check_unit("blend.w_ma", w_ma)?;
                check_unit("blend.w_risk", w_risk)?;
                check_unit("blend.alpha", alpha)
            }
            Self::Weighted {
                w_ma,
                w_risk,
                w_econ,
            } => {
                check_unit("blend.w_ma", w_ma)?;
                check_unit("blend.w_risk", w_risk)?;
                check_unit("blend.w_econ", w_econ)
            }
        }
    }

    /// Build the composite score.
    ///
    /// A blend needing P_Econ returns an empty series when the signal set
    /// has none, which downstream scoring treats as non-competing.
    pub fn combine(&self, signals: &SignalSet) -> TimeSeries {
        match *self {
            Self::Technical { w_ma, w_risk } => technical(&signals.p_ma, &signals.p_risk, w_ma, w_risk),
            Self::Hybrid { w_ma, w_risk, alpha } => match &signals.p_econ {
                Some(econ) => hybrid(&technical(&signals.p_ma, &signals.p_risk, w_ma, w_risk), econ, alpha),
                None => TimeSeries::default(),
            },
            Self::Weighted {
                w_ma,
                w_risk,
                w_econ,
            } => match &signals.p_econ {
                Some(econ) => weighted(&signals.p_ma, &signals.p_risk, econ, w_ma, w_risk, w_econ),
                None => TimeSeries::default(),
            },
        }
    }
}
