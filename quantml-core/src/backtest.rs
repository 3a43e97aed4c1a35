//! Lagged position backtest.
//!
//! Per period t on the timestamps shared by the composite signal and the
//! asset-return series:
//!
//! 1. `position_t` is decided from `f_t` by a [`DecisionMode`]
//! 2. `applied_t = position_{t-1}` (flat at the first period)
//! 3. `strategy_return_t = applied_t · asset_return_t`
//! 4. the cumulative return folds `strategy_return_t` in the declared
//!    [`ReturnSpace`]
//!
//! An undefined signal or return contributes 0.0 to the realized return.
//! This module is the only place where "undefined" turns into a number.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::math::ReturnSpace;
use crate::params::{check_unit, ParamError};
use crate::series::{inner_join, TimeSeries};

/// Exposure held over one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    Short,
    Flat,
    Long,
    /// Fractional exposure in `[-1, 1]`.
    Partial(f64),
}

impl Position {
    pub fn exposure(&self) -> f64 {
        match self {
            Self::Short => -1.0,
            Self::Flat => 0.0,
            Self::Long => 1.0,
            Self::Partial(w) => *w,
        }
    }
}

/// How a composite score becomes a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionMode {
    /// Centered scores: long above `threshold`, short below `-threshold`.
    Symmetric { threshold: f64 },

    /// Scores in `[0, 1]`: long above `upper`, otherwise short below `lower`.
    /// The long test runs first, so overlapping bands resolve to long.
    Bounded { upper: f64, lower: f64 },

    /// The score itself, clamped to `[-1, 1]`, is the exposure.
    Continuous,
}

impl Default for DecisionMode {
    fn default() -> Self {
        Self::bounded(0.55)
    }
}

impl DecisionMode {
    /// The `(T, 1 − T)` band around a sigmoid-bounded score.
    pub fn bounded(threshold: f64) -> Self {
        Self::Bounded {
            upper: threshold,
            lower: 1.0 - threshold,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Symmetric { .. } => "symmetric",
            Self::Bounded { .. } => "bounded",
            Self::Continuous => "continuous",
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        match *self {
            Self::Symmetric { threshold } => check_unit("decision.threshold", threshold),
            Self::Bounded { upper, lower } => {
                check_unit("decision.upper", upper)?;
                check_unit("decision.lower", lower)
            }
            Self::Continuous => Ok(()),
        }
    }

    pub fn decide(&self, score: f64) -> Position {
        match *self {
            Self::Symmetric { threshold } => {
                if score > threshold {
                    Position::Long
                } else if score < -threshold {
                    Position::Short
                } else {
                    Position::Flat
                }
            }
            Self::Bounded { upper, lower } => {
                if score > upper {
                    Position::Long
                } else if score < lower {
                    Position::Short
                } else {
                    Position::Flat
                }
            }
            Self::Continuous => Position::Partial(score.clamp(-1.0, 1.0)),
        }
    }
}

/// Per-period trace of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRun {
    pub return_space: ReturnSpace,
    pub dates: Vec<NaiveDate>,
    /// Position decided from the signal at each date (`None`: no signal).
    pub positions: Vec<Option<Position>>,
    /// Position held over each date, i.e. the previous date's decision.
    pub applied: Vec<Option<Position>>,
    pub strategy_returns: Vec<f64>,
    pub cumulative: Vec<f64>,
}

impl BacktestRun {
    fn empty(return_space: ReturnSpace) -> Self {
        Self {
            return_space,
            dates: Vec::new(),
            positions: Vec::new(),
            applied: Vec::new(),
            strategy_returns: Vec::new(),
            cumulative: Vec::new(),
        }
    }

    /// True when signal and returns shared no timestamps.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn final_cumulative(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Cumulative return path as a dated series.
    pub fn equity_series(&self) -> TimeSeries {
        TimeSeries::new(
            self.dates.clone(),
            self.cumulative.iter().map(|r| Some(*r)).collect(),
        )
        .unwrap_or_default()
    }
}

/// Deterministic fold of a composite signal over asset returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestSimulator {
    pub mode: DecisionMode,
    pub return_space: ReturnSpace,
}

impl BacktestSimulator {
    pub fn new(mode: DecisionMode, return_space: ReturnSpace) -> Self {
        Self { mode, return_space }
    }

    /// Run the backtest.
    ///
    /// `asset_returns` must be in this simulator's return space; the value
    /// at t is the return realized over the period ending at t. Signal and
    /// returns are joined on timestamps; unmatched dates are dropped.
    pub fn run(&self, signal: &TimeSeries, asset_returns: &TimeSeries) -> BacktestRun {
        let (dates, scores, returns) = inner_join(signal, asset_returns);
        if dates.is_empty() {
            return BacktestRun::empty(self.return_space);
        }

        let positions: Vec<Option<Position>> = scores
            .iter()
            .map(|s| s.map(|score| self.mode.decide(score)))
            .collect();

        let mut applied = Vec::with_capacity(dates.len());
        let mut strategy_returns = Vec::with_capacity(dates.len());
        let mut cumulative = Vec::with_capacity(dates.len());
        let mut running = 0.0;

        for t in 0..dates.len() {
            let held = if t == 0 { Some(Position::Flat) } else { positions[t - 1] };
            let r = match (held, returns[t]) {
                (Some(p), Some(r)) => p.exposure() * r,
                _ => 0.0,
            };
            running = self.return_space.accumulate(running, r);
            applied.push(held);
            strategy_returns.push(r);
            cumulative.push(running);
        }

        BacktestRun {
            return_space: self.return_space,
            dates,
            positions,
            applied,
            strategy_returns,
            cumulative,
        }
    }
}
