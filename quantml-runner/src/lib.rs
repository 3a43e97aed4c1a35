//! QuantML Runner: evaluation, grid search, study config, data and export.
//!
//! This crate builds on `quantml-core` to provide:
//! - Performance metrics (Sharpe, drawdown, win rate, win/loss)
//! - The scoring objective and the exhaustive grid optimizer
//! - TOML study configuration with fail-fast validation
//! - CSV and synthetic series loading
//! - The single-run pipeline and CSV/JSON export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod grid;
pub mod metrics;
pub mod runner;

pub use config::{CompositeSettings, ConfigError, DecisionSettings, StrategyConfig, StudyConfig};
pub use data_loader::{load_study_data, DataSource, LoadError, LoadedData};
pub use export::{write_backtest_artifacts, write_sweep_artifacts};
pub use fitness::Objective;
pub use grid::{Axis, GridOptimizer, GridOutcome, GridResult, Param, ParamSpace};
pub use metrics::{Frequency, PerformanceEvaluator, PerformanceReport};
pub use runner::{
    run_backtest, run_sweep, run_sweep_with_progress, BacktestOutcome, Pipeline, RunError, StudyInputs,
    SweepOptions, SweepOutcome,
};
