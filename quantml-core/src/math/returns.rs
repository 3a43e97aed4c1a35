//! Period-over-period returns.

use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;

/// Which return representation a backtest works in.
///
/// Log returns accumulate additively, simple returns multiplicatively. The
/// two are never mixed inside one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnSpace {
    #[default]
    Log,
    Simple,
}

impl ReturnSpace {
    /// Returns of `price` in this space.
    pub fn returns(&self, price: &TimeSeries) -> TimeSeries {
        match self {
            Self::Log => log_returns(price),
            Self::Simple => simple_returns(price),
        }
    }

    /// Fold one period's return into a running cumulative return.
    pub fn accumulate(&self, cumulative: f64, period_return: f64) -> f64 {
        match self {
            Self::Log => cumulative + period_return,
            Self::Simple => (1.0 + cumulative) * (1.0 + period_return) - 1.0,
        }
    }

    /// Convert a cumulative return in this space into a simple growth factor.
    pub fn growth_factor(&self, cumulative: f64) -> f64 {
        match self {
            Self::Log => cumulative.exp(),
            Self::Simple => 1.0 + cumulative,
        }
    }
}

fn pairwise(price: &TimeSeries, f: impl Fn(f64, f64) -> f64) -> TimeSeries {
    let v = price.values();
    let mut out = Vec::with_capacity(v.len());
    for i in 0..v.len() {
        let r = if i == 0 {
            None
        } else {
            match (v[i - 1], v[i]) {
                (Some(prev), Some(cur)) if prev > 0.0 && cur > 0.0 => Some(f(prev, cur)),
                _ => None,
            }
        };
        out.push(r);
    }
    price.with_values(out)
}

/// `ln(p_t / p_{t-1})`; the first period and non-positive prices are undefined.
pub fn log_returns(price: &TimeSeries) -> TimeSeries {
    pairwise(price, |prev, cur| (cur / prev).ln())
}

/// `p_t / p_{t-1} - 1`; the first period and non-positive prices are undefined.
pub fn simple_returns(price: &TimeSeries) -> TimeSeries {
    pairwise(price, |prev, cur| cur / prev - 1.0)
}
