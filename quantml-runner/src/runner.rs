//! Study runner: wires data → signals → blend → backtest → metrics.
//!
//! [`Pipeline`] evaluates one parameter combination over shared, read-only
//! inputs. `run_backtest` and `run_sweep` are the end-to-end entry points
//! used by the CLI: validate, load, then evaluate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use quantml_core::combine::center;
use quantml_core::params::ParamError;
use quantml_core::{BacktestRun, BacktestSimulator, SignalInputs, SignalSet, TimeSeries};

use crate::config::{ConfigError, StrategyConfig, StudyConfig};
use crate::data_loader::{load_study_data, LoadError, LoadedData};
use crate::grid::{GridOptimizer, GridOutcome, GridResult};
use crate::metrics::{PerformanceEvaluator, PerformanceReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("invalid parameter: {0}")]
    Param(#[from] ParamError),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Immutable input series of one study.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyInputs {
    pub price: TimeSeries,
    pub gdp: Option<TimeSeries>,
    pub rate: Option<TimeSeries>,
}

impl StudyInputs {
    pub fn price_only(price: TimeSeries) -> Self {
        Self {
            price,
            gdp: None,
            rate: None,
        }
    }

    pub fn with_macro(price: TimeSeries, gdp: TimeSeries, rate: TimeSeries) -> Self {
        Self {
            price,
            gdp: Some(gdp),
            rate: Some(rate),
        }
    }

    pub fn signal_inputs(&self) -> SignalInputs<'_> {
        SignalInputs {
            price: &self.price,
            gdp: self.gdp.as_ref(),
            rate: self.rate.as_ref(),
        }
    }
}

impl From<&LoadedData> for StudyInputs {
    fn from(data: &LoadedData) -> Self {
        Self {
            price: data.price.series.clone(),
            gdp: data.gdp.as_ref().map(|s| s.series.clone()),
            rate: data.rate.as_ref().map(|s| s.series.clone()),
        }
    }
}

/// Every intermediate of one evaluated combination.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub signals: SignalSet,
    pub composite: TimeSeries,
    pub backtest: BacktestRun,
    pub report: PerformanceReport,
}

/// One study's evaluation context, shared read-only by all combinations.
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    inputs: &'a StudyInputs,
    asset_returns: TimeSeries,
    evaluator: PerformanceEvaluator,
}

impl<'a> Pipeline<'a> {
    /// Asset returns are computed once, in the evaluator's return space.
    pub fn new(inputs: &'a StudyInputs, evaluator: PerformanceEvaluator) -> Self {
        Self {
            inputs,
            asset_returns: evaluator.return_space.returns(&inputs.price),
            evaluator,
        }
    }

    pub fn asset_returns(&self) -> &TimeSeries {
        &self.asset_returns
    }

    pub fn run(&self, strategy: &StrategyConfig) -> PipelineOutput {
        let signals = strategy.signals.generate(&self.inputs.signal_inputs());
        let mut composite = strategy.blend.combine(&signals);
        if strategy.center {
            composite = center(&composite);
        }
        let simulator = BacktestSimulator::new(strategy.decision, self.evaluator.return_space);
        let backtest = simulator.run(&composite, &self.asset_returns);
        let report = self.evaluator.evaluate_run(&backtest);
        PipelineOutput {
            signals,
            composite,
            backtest,
            report,
        }
    }

    /// Only the report; intermediates are dropped.
    pub fn evaluate(&self, strategy: &StrategyConfig) -> PerformanceReport {
        self.run(strategy).report
    }
}

/// Result of a single configured backtest.
#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub fingerprint: String,
    pub has_synthetic: bool,
    pub strategy: StrategyConfig,
    pub output: PipelineOutput,
}

/// Options for a sweep beyond the study file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    pub time_budget: Option<Duration>,
}

/// Result of a grid search over a study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub fingerprint: String,
    pub has_synthetic: bool,
    pub grid: GridOutcome,
}

/// Deterministic BLAKE3 identity of a study: its configuration plus the
/// hash of the loaded data.
pub fn study_fingerprint(config: &StudyConfig, dataset_hash: &str) -> Result<String, RunError> {
    let json = serde_json::to_string(config)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(json.as_bytes());
    hasher.update(dataset_hash.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

fn prepare(config: &StudyConfig) -> Result<(LoadedData, String), RunError> {
    config.validate()?;
    let data = load_study_data(&config.data)?;
    let fingerprint = study_fingerprint(config, &data.dataset_hash)?;
    Ok((data, fingerprint))
}

/// Validate, load and run the configured strategy once.
pub fn run_backtest(config: &StudyConfig) -> Result<BacktestOutcome, RunError> {
    let (data, fingerprint) = prepare(config)?;
    let strategy = config.strategy()?;
    let inputs = StudyInputs::from(&data);
    let output = Pipeline::new(&inputs, config.evaluator()).run(&strategy);
    info!(
        fingerprint = %fingerprint,
        blend = strategy.blend.name(),
        decision = strategy.decision.name(),
        periods = output.report.periods,
        "backtest finished"
    );
    Ok(BacktestOutcome {
        fingerprint,
        has_synthetic: data.has_synthetic,
        strategy,
        output,
    })
}

/// Validate, load and grid-search the study.
pub fn run_sweep(config: &StudyConfig, options: SweepOptions) -> Result<SweepOutcome, RunError> {
    run_sweep_with_progress(config, options, |_, _, _| {})
}

pub fn run_sweep_with_progress<F>(config: &StudyConfig, options: SweepOptions, progress: F) -> Result<SweepOutcome, RunError>
where
    F: Fn(usize, usize, &GridResult) + Send + Sync,
{
    let (data, fingerprint) = prepare(config)?;
    let mut optimizer = GridOptimizer::new(&config.param_space()?, &config.strategy()?, config.objective)?
        .with_parallelism(config.grid.parallel);
    if let Some(budget) = options.time_budget {
        optimizer = optimizer.with_time_budget(budget);
    }
    let inputs = StudyInputs::from(&data);
    let grid = optimizer.run_with_progress(&Pipeline::new(&inputs, config.evaluator()), progress);
    Ok(SweepOutcome {
        fingerprint,
        has_synthetic: data.has_synthetic,
        grid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Frequency;
    use chrono::NaiveDate;
    use quantml_core::{Blend, DecisionMode, ReturnSpace, SignalParams};

    fn trending_inputs(n: usize) -> StudyInputs {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let pairs: Vec<(NaiveDate, f64)> = (0..n)
            .map(|i| {
                let t = i as f64;
                (start + chrono::Duration::days(i as i64), 100.0 + t * 0.5 + (t * 0.7).sin() * 3.0)
            })
            .collect();
        StudyInputs::price_only(TimeSeries::from_pairs(&pairs).unwrap())
    }

    fn strategy() -> StrategyConfig {
        StrategyConfig {
            signals: SignalParams::default(),
            blend: Blend::default(),
            center: false,
            decision: DecisionMode::bounded(0.55),
        }
    }

    #[test]
    fn pipeline_keeps_price_axis() {
        let inputs = trending_inputs(120);
        let pipeline = Pipeline::new(&inputs, PerformanceEvaluator::default());
        let out = pipeline.run(&strategy());
        assert_eq!(out.signals.p_ma.len(), 120);
        assert_eq!(out.composite.len(), 120);
        assert_eq!(out.backtest.len(), 120);
        assert_eq!(out.report.periods, 120);
        assert!(out.signals.p_econ.is_none());
    }

    #[test]
    fn econ_blend_without_macro_is_non_competing() {
        let inputs = trending_inputs(60);
        let mut s = strategy();
        s.blend = Blend::Hybrid {
            w_ma: 0.5,
            w_risk: 0.5,
            alpha: 0.5,
        };
        let report = Pipeline::new(&inputs, PerformanceEvaluator::default()).evaluate(&s);
        assert_eq!(report.periods, 0);
        assert_eq!(report.sharpe_ratio, None);
    }

    fn exposures(out: &PipelineOutput) -> Vec<f64> {
        out.backtest.positions.iter().flatten().map(|p| p.exposure()).collect()
    }

    #[test]
    fn centered_composite_lets_symmetric_go_short() {
        let inputs = trending_inputs(200);
        let pipeline = Pipeline::new(&inputs, PerformanceEvaluator::default());
        let mut s = strategy();
        // P_MA alone: its standardized spread has mean zero, so both signs occur
        s.blend = Blend::Technical { w_ma: 1.0, w_risk: 0.0 };
        s.decision = DecisionMode::Symmetric { threshold: 0.0 };

        let raw = exposures(&pipeline.run(&s));
        assert!(raw.iter().all(|e| *e >= 0.0));

        s.center = true;
        let out = pipeline.run(&s);
        assert!(out.composite.values().iter().flatten().all(|f| (-1.0..=1.0).contains(f)));
        let centered = exposures(&out);
        assert!(centered.iter().any(|e| *e < 0.0));
        assert!(centered.iter().any(|e| *e > 0.0));

        s.decision = DecisionMode::Continuous;
        assert!(exposures(&pipeline.run(&s)).iter().any(|e| *e < 0.0));
    }

    #[test]
    fn evaluator_return_space_flows_through() {
        let inputs = trending_inputs(80);
        let evaluator = PerformanceEvaluator::new(Frequency::Daily, ReturnSpace::Simple, false);
        let out = Pipeline::new(&inputs, evaluator).run(&strategy());
        assert_eq!(out.backtest.return_space, ReturnSpace::Simple);
        assert_eq!(out.report.return_space, ReturnSpace::Simple);
    }

    #[test]
    fn fingerprint_is_stable_and_config_sensitive() {
        let a = StudyConfig::from_toml_str("[data]\nsynthetic = true\n").unwrap();
        let b = StudyConfig::from_toml_str("[data]\nsynthetic = true\n[blend]\ntype = \"TECHNICAL\"\nw_ma = 0.9\nw_risk = 0.1\n").unwrap();
        assert_eq!(study_fingerprint(&a, "x").unwrap(), study_fingerprint(&a, "x").unwrap());
        assert_ne!(study_fingerprint(&a, "x").unwrap(), study_fingerprint(&b, "x").unwrap());
        assert_ne!(study_fingerprint(&a, "x").unwrap(), study_fingerprint(&a, "y").unwrap());
    }

    #[test]
    fn invalid_config_fails_before_loading() {
        let config = StudyConfig::from_toml_str("[data]\nprice_csv = \"/nonexistent/prices.csv\"\n[signals.ma]\nshort_window = 20\nlong_window = 5\nlambda = 1.0\n").unwrap();
        assert!(matches!(run_backtest(&config), Err(RunError::Config(_))));
    }
}
