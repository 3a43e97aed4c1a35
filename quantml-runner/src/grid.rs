//! Exhaustive grid search over signal, blend and decision parameters.
//!
//! The parameter space is the Cartesian product of named axes, enumerated
//! with the first declared axis outermost. Every combination overrides a
//! base [`StrategyConfig`] and is validated before anything runs. Results
//! keep enumeration order whether evaluation is parallel or sequential, and
//! the best combination is the first one reaching the maximum score.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quantml_core::params::{window_from_f64, ParamError};
use quantml_core::{Blend, DecisionMode};

use crate::config::StrategyConfig;
use crate::fitness::Objective;
use crate::metrics::PerformanceReport;
use crate::runner::Pipeline;

/// Upper bound on the number of combinations in one grid.
pub const MAX_GRID_COMBINATIONS: usize = 1_000_000;

/// A searchable parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Symmetric threshold, or T of the bounded `(T, 1 − T)` band.
    Threshold,
    UpperThreshold,
    LowerThreshold,
    LambdaMa,
    LambdaRisk,
    LambdaEcon,
    ShortWindow,
    LongWindow,
    RiskWindow,
    VarQuantile,
    RiskBias,
    WeightMa,
    WeightRisk,
    WeightEcon,
    Alpha,
}

fn not_applicable(param: Param, reason: &str) -> ParamError {
    ParamError::AxisNotApplicable {
        axis: param.name().to_string(),
        reason: reason.to_string(),
    }
}

impl Param {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::UpperThreshold => "upper_threshold",
            Self::LowerThreshold => "lower_threshold",
            Self::LambdaMa => "lambda_ma",
            Self::LambdaRisk => "lambda_risk",
            Self::LambdaEcon => "lambda_econ",
            Self::ShortWindow => "short_window",
            Self::LongWindow => "long_window",
            Self::RiskWindow => "risk_window",
            Self::VarQuantile => "var_quantile",
            Self::RiskBias => "risk_bias",
            Self::WeightMa => "weight_ma",
            Self::WeightRisk => "weight_risk",
            Self::WeightEcon => "weight_econ",
            Self::Alpha => "alpha",
        }
    }

    /// Override this parameter in `strategy`.
    ///
    /// Fails when the parameter has no meaning for the strategy's blend or
    /// decision rule, or when a window value is not a whole number.
    pub fn apply(&self, strategy: &mut StrategyConfig, value: f64) -> Result<(), ParamError> {
        let param = *self;
        match param {
            Self::Threshold => {
                strategy.decision = match strategy.decision {
                    DecisionMode::Symmetric { .. } => DecisionMode::Symmetric { threshold: value },
                    DecisionMode::Bounded { .. } => DecisionMode::bounded(value),
                    DecisionMode::Continuous => {
                        return Err(not_applicable(param, "continuous decisions have no threshold"))
                    }
                };
            }
            Self::UpperThreshold | Self::LowerThreshold => {
                let DecisionMode::Bounded { upper, lower } = strategy.decision else {
                    return Err(not_applicable(param, "only BOUNDED decisions have upper/lower thresholds"));
                };
                strategy.decision = if param == Self::UpperThreshold {
                    DecisionMode::Bounded { upper: value, lower }
                } else {
                    DecisionMode::Bounded { upper, lower: value }
                };
            }
            Self::LambdaMa => strategy.signals.ma.lambda = value,
            Self::LambdaRisk => strategy.signals.risk.lambda = value,
            Self::LambdaEcon => {
                if !strategy.blend.needs_econ() {
                    return Err(not_applicable(param, "the blend does not use P_Econ"));
                }
                strategy.signals.econ.lambda = value;
            }
            Self::ShortWindow => strategy.signals.ma.short_window = window_from_f64(param.name(), value)?,
            Self::LongWindow => strategy.signals.ma.long_window = window_from_f64(param.name(), value)?,
            Self::RiskWindow => strategy.signals.risk.window = window_from_f64(param.name(), value)?,
            Self::VarQuantile => strategy.signals.risk.var_quantile = value,
            Self::RiskBias => strategy.signals.risk.bias = value,
            Self::WeightMa => {
                strategy.blend = match strategy.blend {
                    Blend::Technical { w_risk, .. } => Blend::Technical { w_ma: value, w_risk },
                    Blend::Hybrid { w_risk, alpha, .. } => Blend::Hybrid {
                        w_ma: value,
                        w_risk,
                        alpha,
                    },
                    Blend::Weighted { w_risk, w_econ, .. } => Blend::Weighted {
                        w_ma: value,
                        w_risk,
                        w_econ,
                    },
                };
            }
            Self::WeightRisk => {
                strategy.blend = match strategy.blend {
                    Blend::Technical { w_ma, .. } => Blend::Technical { w_ma, w_risk: value },
                    Blend::Hybrid { w_ma, alpha, .. } => Blend::Hybrid {
                        w_ma,
                        w_risk: value,
                        alpha,
                    },
                    Blend::Weighted { w_ma, w_econ, .. } => Blend::Weighted {
                        w_ma,
                        w_risk: value,
                        w_econ,
                    },
                };
            }
            Self::WeightEcon => {
                let Blend::Weighted { w_ma, w_risk, .. } = strategy.blend else {
                    return Err(not_applicable(param, "only the WEIGHTED blend has weight_econ"));
                };
                strategy.blend = Blend::Weighted {
                    w_ma,
                    w_risk,
                    w_econ: value,
                };
            }
            Self::Alpha => {
                let Blend::Hybrid { w_ma, w_risk, .. } = strategy.blend else {
                    return Err(not_applicable(param, "only the HYBRID blend has alpha"));
                };
                strategy.blend = Blend::Hybrid {
                    w_ma,
                    w_risk,
                    alpha: value,
                };
            }
        }
        Ok(())
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One named axis with its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub param: Param,
    pub values: Vec<f64>,
}

impl Axis {
    pub fn new(param: Param, values: Vec<f64>) -> Self {
        Self { param, values }
    }
}

/// A parameter value inside one combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamValue {
    pub param: Param,
    pub value: f64,
}

/// Declared axes, in nesting order. Deserialization goes through
/// [`ParamSpace::new`], so every instance is validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParamSpace")]
pub struct ParamSpace {
    axes: Vec<Axis>,
}

#[derive(Deserialize)]
struct RawParamSpace {
    axes: Vec<Axis>,
}

impl TryFrom<RawParamSpace> for ParamSpace {
    type Error = ParamError;

    fn try_from(raw: RawParamSpace) -> Result<Self, ParamError> {
        Self::new(raw.axes)
    }
}

impl ParamSpace {
    /// Rejects empty and duplicate axes, and grids larger than
    /// [`MAX_GRID_COMBINATIONS`].
    pub fn new(axes: Vec<Axis>) -> Result<Self, ParamError> {
        let mut seen = HashSet::new();
        for axis in &axes {
            if axis.values.is_empty() {
                return Err(ParamError::EmptyAxis {
                    axis: axis.param.name().to_string(),
                });
            }
            if !seen.insert(axis.param) {
                return Err(ParamError::DuplicateAxis {
                    axis: axis.param.name().to_string(),
                });
            }
        }
        let combinations = axes.iter().try_fold(1usize, |acc, a| {
            acc.checked_mul(a.values.len())
                .filter(|n| *n <= MAX_GRID_COMBINATIONS)
        });
        if combinations.is_none() {
            return Err(ParamError::GridTooLarge {
                limit: MAX_GRID_COMBINATIONS,
            });
        }
        Ok(Self { axes })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn params(&self) -> Vec<Param> {
        self.axes.iter().map(|a| a.param).collect()
    }

    /// Number of combinations. A space without axes has one: the base.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All combinations, first axis outermost.
    pub fn combinations(&self) -> Vec<Vec<ParamValue>> {
        let mut out: Vec<Vec<ParamValue>> = vec![Vec::new()];
        for axis in &self.axes {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |&value| {
                        let mut combo = prefix.clone();
                        combo.push(ParamValue {
                            param: axis.param,
                            value,
                        });
                        combo
                    })
                })
                .collect();
        }
        out
    }

    /// Checks that every axis means something for `base`, independently
    /// of the values it carries.
    pub fn check_applicable(&self, base: &StrategyConfig) -> Result<(), ParamError> {
        let has = |p: Param| self.axes.iter().any(|a| a.param == p);
        if has(Param::Threshold) {
            for p in [Param::UpperThreshold, Param::LowerThreshold] {
                if has(p) {
                    return Err(not_applicable(p, "conflicts with the threshold axis"));
                }
            }
        }
        for axis in &self.axes {
            let Some(&value) = axis.values.first() else { continue };
            let mut trial = base.clone();
            if let Err(e @ ParamError::AxisNotApplicable { .. }) = axis.param.apply(&mut trial, value) {
                return Err(e);
            }
        }
        Ok(())
    }

    /// Apply every axis to copies of `base` and validate each result.
    pub fn strategies(&self, base: &StrategyConfig) -> Result<Vec<(Vec<ParamValue>, StrategyConfig)>, ParamError> {
        self.check_applicable(base)?;
        self.combinations()
            .into_iter()
            .enumerate()
            .map(|(index, combo)| {
                let mut strategy = base.clone();
                let applied = combo
                    .iter()
                    .try_for_each(|pv| pv.param.apply(&mut strategy, pv.value))
                    .and_then(|_| strategy.validate());
                match applied {
                    Ok(()) => Ok((combo, strategy)),
                    Err(source) => Err(ParamError::Combination {
                        index,
                        source: Box::new(source),
                    }),
                }
            })
            .collect()
    }
}

/// One row of the result grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResult {
    pub index: usize,
    pub params: Vec<ParamValue>,
    /// `None` when the deadline passed before this combination started.
    pub report: Option<PerformanceReport>,
    /// `None` for undefined scores; such rows never win.
    pub score: Option<f64>,
    pub skipped: bool,
}

impl GridResult {
    pub fn sharpe(&self) -> Option<f64> {
        self.report.as_ref().and_then(|r| r.sharpe_ratio)
    }

    pub fn win_rate(&self) -> Option<f64> {
        self.report.as_ref().map(|r| r.win_rate)
    }

    pub fn value_of(&self, param: Param) -> Option<f64> {
        self.params.iter().find(|pv| pv.param == param).map(|pv| pv.value)
    }
}

/// The winning combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    pub index: usize,
    pub params: Vec<ParamValue>,
    pub score: f64,
    pub strategy: StrategyConfig,
    pub report: PerformanceReport,
}

/// Everything a grid search produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridOutcome {
    pub axes: Vec<Param>,
    pub best: Option<BestResult>,
    pub full_grid: Vec<GridResult>,
}

impl GridOutcome {
    pub fn len(&self) -> usize {
        self.full_grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full_grid.is_empty()
    }

    pub fn skipped_count(&self) -> usize {
        self.full_grid.iter().filter(|r| r.skipped).count()
    }

    pub fn scored_count(&self) -> usize {
        self.full_grid.iter().filter(|r| r.score.is_some()).count()
    }

    /// The `n` best scored rows, highest first; ties keep grid order.
    pub fn top_n(&self, n: usize) -> Vec<&GridResult> {
        let mut scored: Vec<(f64, &GridResult)> = self
            .full_grid
            .iter()
            .filter_map(|r| r.score.map(|s| (s, r)))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(n).map(|(_, r)| r).collect()
    }
}

/// Exhaustive search executor.
pub struct GridOptimizer {
    axes: Vec<Param>,
    candidates: Vec<(Vec<ParamValue>, StrategyConfig)>,
    objective: Objective,
    parallel: bool,
    time_budget: Option<Duration>,
}

impl GridOptimizer {
    /// Expands and validates every combination up front.
    pub fn new(space: &ParamSpace, base: &StrategyConfig, objective: Objective) -> Result<Self, ParamError> {
        objective.validate()?;
        Ok(Self {
            axes: space.params(),
            candidates: space.strategies(base)?,
            objective,
            parallel: true,
            time_budget: None,
        })
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Combinations not started within `budget` of the search start are
    /// recorded as skipped.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn run(&self, pipeline: &Pipeline<'_>) -> GridOutcome {
        self.run_with_progress(pipeline, |_, _, _| {})
    }

    /// Runs the search, invoking `progress(index, total, row)` once per
    /// combination as it completes (in completion order when parallel).
    pub fn run_with_progress<F>(&self, pipeline: &Pipeline<'_>, progress: F) -> GridOutcome
    where
        F: Fn(usize, usize, &GridResult) + Send + Sync,
    {
        let total = self.candidates.len();
        let axis_names: Vec<&str> = self.axes.iter().map(|p| p.name()).collect();
        info!(
            combinations = total,
            axes = ?axis_names,
            parallel = self.parallel,
            objective = self.objective.name(),
            "starting grid search"
        );
        let started = Instant::now();
        let deadline = self.time_budget.map(|b| started + b);

        let evaluate = |(index, (params, strategy)): (usize, &(Vec<ParamValue>, StrategyConfig))| {
            let row = self.evaluate_one(index, params, strategy, pipeline, deadline);
            progress(index, total, &row);
            row
        };

        let full_grid: Vec<GridResult> = if self.parallel {
            self.candidates.par_iter().enumerate().map(evaluate).collect()
        } else {
            self.candidates.iter().enumerate().map(evaluate).collect()
        };

        let best = self.select_best(&full_grid);
        let skipped = full_grid.iter().filter(|r| r.skipped).count();
        match &best {
            Some(b) => info!(
                index = b.index,
                score = b.score,
                skipped,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "grid search finished"
            ),
            None => info!(skipped, "grid search finished without a scored combination"),
        }

        GridOutcome {
            axes: self.axes.clone(),
            best,
            full_grid,
        }
    }

    fn evaluate_one(
        &self,
        index: usize,
        params: &[ParamValue],
        strategy: &StrategyConfig,
        pipeline: &Pipeline<'_>,
        deadline: Option<Instant>,
    ) -> GridResult {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(index, "deadline passed, combination skipped");
            return GridResult {
                index,
                params: params.to_vec(),
                report: None,
                score: None,
                skipped: true,
            };
        }

        let report = pipeline.evaluate(strategy);
        let score = self.objective.score(&report);
        match score {
            Some(s) => debug!(index, score = s, "combination evaluated"),
            None => debug!(index, periods = report.periods, "combination excluded: undefined score"),
        }
        GridResult {
            index,
            params: params.to_vec(),
            report: Some(report),
            score,
            skipped: false,
        }
    }

    fn select_best(&self, grid: &[GridResult]) -> Option<BestResult> {
        let mut best: Option<(&GridResult, f64)> = None;
        for row in grid {
            let Some(score) = row.score else { continue };
            match best {
                Some((_, current)) if !Objective::is_better(score, current) => {}
                _ => best = Some((row, score)),
            }
        }
        let (row, score) = best?;
        Some(BestResult {
            index: row.index,
            params: row.params.clone(),
            score,
            strategy: self.candidates[row.index].1.clone(),
            report: row.report.clone()?,
        })
    }
}
