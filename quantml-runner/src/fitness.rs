//! Fitness objective: the scalar the grid optimizer maximizes.

use serde::{Deserialize, Serialize};

use quantml_core::params::{finite, ParamError};

use crate::metrics::PerformanceReport;

/// How a [`PerformanceReport`] collapses into one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Objective {
    /// `sharpe_weight * sharpe + win_rate_weight * win_rate`.
    SharpeWinRate {
        #[serde(default = "default_sharpe_weight")]
        sharpe_weight: f64,
        #[serde(default = "default_win_rate_weight")]
        win_rate_weight: f64,
    },

    /// Unweighted `sharpe + win_loss_ratio`.
    SharpePlusWinLoss,
}

fn default_sharpe_weight() -> f64 {
    0.7
}

fn default_win_rate_weight() -> f64 {
    0.3
}

impl Default for Objective {
    fn default() -> Self {
        Self::SharpeWinRate {
            sharpe_weight: default_sharpe_weight(),
            win_rate_weight: default_win_rate_weight(),
        }
    }
}

impl Objective {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SharpeWinRate { .. } => "sharpe_win_rate",
            Self::SharpePlusWinLoss => "sharpe_plus_win_loss",
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        match *self {
            Self::SharpeWinRate {
                sharpe_weight,
                win_rate_weight,
            } => {
                finite("objective.sharpe_weight", sharpe_weight)?;
                finite("objective.win_rate_weight", win_rate_weight)
            }
            Self::SharpePlusWinLoss => Ok(()),
        }
    }

    /// Score a report. `None` when any input the objective needs is
    /// undefined or the backtest covered no periods; such combinations do
    /// not compete.
    pub fn score(&self, report: &PerformanceReport) -> Option<f64> {
        if report.periods == 0 {
            return None;
        }
        let sharpe = report.sharpe_ratio?;
        let score = match *self {
            Self::SharpeWinRate {
                sharpe_weight,
                win_rate_weight,
            } => sharpe_weight * sharpe + win_rate_weight * report.win_rate,
            Self::SharpePlusWinLoss => sharpe + report.win_loss_ratio?,
        };
        score.is_finite().then_some(score)
    }

    /// Whether score `a` beats score `b`. Strict, so the earlier of two
    /// equal scores is kept.
    pub fn is_better(a: f64, b: f64) -> bool {
        a > b
    }
}
