//! Performance metrics: pure functions over a strategy return series.
//!
//! Undefined periods were already filled with 0.0 by the simulator, so every
//! function here takes plain `&[f64]`. Quantities that have no meaningful
//! value (Sharpe with zero variance, win/loss with no losses) are `None`.

use serde::{Deserialize, Serialize};

use quantml_core::math::{mean, std_dev, VARIANCE_EPSILON};
use quantml_core::{BacktestRun, ReturnSpace};

/// Sampling frequency of the evaluated series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Weekly => 52.0,
            Self::Monthly => 12.0,
        }
    }
}

/// Aggregate performance of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub win_loss_ratio: Option<f64>,
    pub periods: usize,
    pub return_space: ReturnSpace,
}

/// Turns a strategy return series into a [`PerformanceReport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEvaluator {
    pub frequency: Frequency,
    pub return_space: ReturnSpace,
    pub annualize_sharpe: bool,
}

impl Default for PerformanceEvaluator {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            return_space: ReturnSpace::Log,
            annualize_sharpe: true,
        }
    }
}

impl PerformanceEvaluator {
    pub fn new(frequency: Frequency, return_space: ReturnSpace, annualize_sharpe: bool) -> Self {
        Self {
            frequency,
            return_space,
            annualize_sharpe,
        }
    }

    pub fn evaluate(&self, returns: &[f64]) -> PerformanceReport {
        let ppy = self.frequency.periods_per_year();
        let path = cumulative_path(returns, self.return_space);
        let cumulative = path.last().copied().unwrap_or(0.0);
        PerformanceReport {
            cumulative_return: cumulative,
            annualized_return: annualized_return(cumulative, returns.len(), ppy, self.return_space),
            sharpe_ratio: sharpe_ratio(returns, self.annualize_sharpe.then_some(ppy)),
            max_drawdown: max_drawdown(&path),
            win_rate: win_rate(returns),
            win_loss_ratio: win_loss_ratio(returns),
            periods: returns.len(),
            return_space: self.return_space,
        }
    }

    /// Evaluate a simulator trace. The trace's own return space wins over
    /// the evaluator's so the two are never mixed.
    pub fn evaluate_run(&self, run: &BacktestRun) -> PerformanceReport {
        let evaluator = Self {
            return_space: run.return_space,
            ..*self
        };
        evaluator.evaluate(&run.strategy_returns)
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Running cumulative return: a sum in log space, a compounded product
/// minus one in simple space.
pub fn cumulative_path(returns: &[f64], space: ReturnSpace) -> Vec<f64> {
    returns
        .iter()
        .scan(0.0, |acc, r| {
            *acc = space.accumulate(*acc, *r);
            Some(*acc)
        })
        .collect()
}

/// Compounded growth rescaled to one year.
///
/// Returns 0.0 for an empty series and -1.0 once the growth factor is
/// non-positive (total loss).
pub fn annualized_return(cumulative: f64, periods: usize, periods_per_year: f64, space: ReturnSpace) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    let growth = space.growth_factor(cumulative);
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(periods_per_year / periods as f64) - 1.0
}

/// `mean / sample std`, multiplied by `sqrt(periods_per_year)` when given.
///
/// `None` with fewer than 2 periods or a standard deviation below
/// [`VARIANCE_EPSILON`].
pub fn sharpe_ratio(returns: &[f64], annualize: Option<f64>) -> Option<f64> {
    let m = mean(returns)?;
    let sd = std_dev(returns)?;
    if sd < VARIANCE_EPSILON {
        return None;
    }
    let raw = m / sd;
    Some(match annualize {
        Some(ppy) => raw * ppy.sqrt(),
        None => raw,
    })
}

/// Most negative `cum_t - max(cum_0..=t)`; 0.0 for an empty or monotone path.
pub fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &c in cumulative {
        peak = peak.max(c);
        worst = worst.min(c - peak);
    }
    worst
}

/// Fraction of periods with a strictly positive return.
pub fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

/// `mean(wins) / |mean(losses)|`.
///
/// `None` when there are no losing periods. 0.0 when there are losses but
/// no wins.
pub fn win_loss_ratio(returns: &[f64]) -> Option<f64> {
    let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let avg_loss = mean(&losses)?.abs();
    let wins: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
    let avg_win = mean(&wins).unwrap_or(0.0);
    Some(avg_win / avg_loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-10, "expected {b}, got {a}");
    }

    const SAMPLE: [f64; 5] = [0.02, -0.01, 0.03, -0.02, 0.01];

    #[test]
    fn sample_series_metrics() {
        approx(win_rate(&SAMPLE), 0.6);
        approx(win_loss_ratio(&SAMPLE).unwrap(), 0.02 / 0.015);

        let path = cumulative_path(&SAMPLE, ReturnSpace::Log);
        for (got, want) in path.iter().zip([0.02, 0.01, 0.04, 0.02, 0.03]) {
            approx(*got, want);
        }
        approx(max_drawdown(&path), -0.02);
        approx(PerformanceEvaluator::default().evaluate(&SAMPLE).cumulative_return, 0.03);
    }

    #[test]
    fn all_zero_series() {
        let zeros = [0.0; 10];
        let report = PerformanceEvaluator::default().evaluate(&zeros);
        assert_eq!(report.cumulative_return, 0.0);
        assert_eq!(report.sharpe_ratio, None);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.win_loss_ratio, None);
        assert_eq!(report.annualized_return, 0.0);
        assert_eq!(report.periods, 10);
    }

    #[test]
    fn empty_series() {
        let report = PerformanceEvaluator::default().evaluate(&[]);
        assert_eq!(report.cumulative_return, 0.0);
        assert_eq!(report.sharpe_ratio, None);
        assert_eq!(report.periods, 0);
    }

    #[test]
    fn no_losses_is_undefined_ratio() {
        assert_eq!(win_loss_ratio(&[0.01, 0.0, 0.02]), None);
        assert_eq!(win_loss_ratio(&[-0.01, 0.0]), Some(0.0));
    }

    #[test]
    fn sharpe_annualization() {
        let raw = sharpe_ratio(&SAMPLE, None).unwrap();
        let m = 0.03 / 5.0;
        let sd = std_dev(&SAMPLE).unwrap();
        approx(raw, m / sd);
        approx(sharpe_ratio(&SAMPLE, Some(12.0)).unwrap(), raw * 12.0_f64.sqrt());
        assert_eq!(sharpe_ratio(&[0.01], None), None);
    }

    #[test]
    fn simple_space_compounds() {
        let r = [0.1, 0.1];
        approx(cumulative_path(&r, ReturnSpace::Simple)[1], 0.21);
        // two months of 10% each: 1.21^(12/2) - 1
        approx(
            annualized_return(0.21, 2, 12.0, ReturnSpace::Simple),
            1.21_f64.powf(6.0) - 1.0,
        );
    }

    #[test]
    fn total_loss_annualizes_to_minus_one() {
        assert_eq!(annualized_return(-1.0, 12, 12.0, ReturnSpace::Simple), -1.0);
    }

    #[test]
    fn drawdown_ignores_implicit_zero_start() {
        // first value is the first peak
        approx(max_drawdown(&[-0.05, -0.02, -0.04]), -0.02);
    }

    #[test]
    fn frequency_periods() {
        assert_eq!(Frequency::Daily.periods_per_year(), 252.0);
        assert_eq!(Frequency::Weekly.periods_per_year(), 52.0);
        assert_eq!(Frequency::Monthly.periods_per_year(), 12.0);
    }
}
