//! Serializable study configuration.
//!
//! A study is one TOML file: where the series come from, the base signal
//! and blend parameters, the decision rule, how returns are measured, the
//! objective and the grid axes. Everything is validated before any series
//! is loaded.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quantml_core::params::ParamError;
use quantml_core::{Blend, DecisionMode, ReturnSpace, SignalParams};

use crate::fitness::Objective;
use crate::grid::{Axis, Param, ParamSpace, MAX_GRID_COMBINATIONS};
use crate::metrics::{Frequency, PerformanceEvaluator};

/// Errors from reading or validating a study configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid parameter: {0}")]
    Param(#[from] ParamError),

    #[error("BOUNDED decision needs either `threshold` or both `upper` and `lower`")]
    AmbiguousBounds,

    #[error("no price source: set data.price_csv or data.synthetic = true")]
    MissingPriceSource,

    #[error("data.gdp_csv and data.rate_csv must be given together")]
    PartialMacroSource,

    #[error("blend '{blend}' needs P_Econ: set data.gdp_csv and data.rate_csv, or data.synthetic = true")]
    MissingMacroSource { blend: &'static str },

    #[error("SYMMETRIC decisions compare against ±threshold: set composite.center = true")]
    UncenteredSymmetric,

    #[error("data.start ({start}) must be before data.end ({end})")]
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Top-level study configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub data: DataConfig,

    #[serde(default)]
    pub signals: SignalParams,

    #[serde(default)]
    pub blend: Blend,

    #[serde(default)]
    pub composite: CompositeSettings,

    #[serde(default)]
    pub decision: DecisionSettings,

    #[serde(default)]
    pub backtest: BacktestSettings,

    #[serde(default)]
    pub objective: Objective,

    #[serde(default)]
    pub grid: GridConfig,
}

/// Where the price and macro series come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub price_csv: Option<PathBuf>,
    pub price_column: Option<String>,

    pub gdp_csv: Option<PathBuf>,
    pub gdp_column: Option<String>,

    pub rate_csv: Option<PathBuf>,
    pub rate_column: Option<String>,

    #[serde(default)]
    pub frequency: Frequency,

    /// Generate deterministic random series instead of reading files.
    #[serde(default)]
    pub synthetic: bool,

    /// Inclusive window. Required bounds for synthetic data default to
    /// 2015-01-01..=2024-12-31; CSV data is trimmed only when set.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DataConfig {
    pub fn has_macro_source(&self) -> bool {
        self.synthetic || (self.gdp_csv.is_some() && self.rate_csv.is_some())
    }

    /// Date window for synthetic generation.
    pub fn synthetic_window(&self) -> (NaiveDate, NaiveDate) {
        let start = self
            .start
            .or_else(|| NaiveDate::from_ymd_opt(2015, 1, 1))
            .unwrap_or_default();
        let end = self
            .end
            .or_else(|| NaiveDate::from_ymd_opt(2024, 12, 31))
            .unwrap_or_default();
        (start, end)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [&mut self.price_csv, &mut self.gdp_csv, &mut self.rate_csv]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.synthetic && self.price_csv.is_none() {
            return Err(ConfigError::MissingPriceSource);
        }
        if self.gdp_csv.is_some() != self.rate_csv.is_some() {
            return Err(ConfigError::PartialMacroSource);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(ConfigError::DateRange { start, end });
            }
        }
        Ok(())
    }
}

/// Post-processing of the blended composite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeSettings {
    /// Map the composite onto `(−1, 1)` via `2f − 1` before deciding.
    #[serde(default)]
    pub center: bool,
}

/// Decision rule as written in the config file.
///
/// `BOUNDED` takes either a single `threshold` T (the `(T, 1 − T)` band)
/// or an explicit `upper`/`lower` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionSettings {
    Symmetric {
        threshold: f64,
    },
    Bounded {
        threshold: Option<f64>,
        upper: Option<f64>,
        lower: Option<f64>,
    },
    Continuous,
}

impl Default for DecisionSettings {
    fn default() -> Self {
        Self::Bounded {
            threshold: Some(0.55),
            upper: None,
            lower: None,
        }
    }
}

impl DecisionSettings {
    pub fn to_mode(&self) -> Result<DecisionMode, ConfigError> {
        let mode = match *self {
            Self::Symmetric { threshold } => DecisionMode::Symmetric { threshold },
            Self::Bounded {
                threshold: Some(t),
                upper: None,
                lower: None,
            } => DecisionMode::bounded(t),
            Self::Bounded {
                threshold: None,
                upper: Some(upper),
                lower: Some(lower),
            } => DecisionMode::Bounded { upper, lower },
            Self::Bounded { .. } => return Err(ConfigError::AmbiguousBounds),
            Self::Continuous => DecisionMode::Continuous,
        };
        mode.validate()?;
        Ok(mode)
    }
}

fn default_true() -> bool {
    true
}

/// How returns are measured and reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default)]
    pub return_space: ReturnSpace,

    #[serde(default = "default_true")]
    pub annualize_sharpe: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            return_space: ReturnSpace::Log,
            annualize_sharpe: true,
        }
    }
}

/// Grid search declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_true")]
    pub parallel: bool,

    #[serde(default)]
    pub axes: Vec<AxisConfig>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            axes: Vec::new(),
        }
    }
}

/// One `[[grid.axes]]` entry: explicit `values` or an inclusive `range`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub param: Param,
    pub values: Option<Vec<f64>>,
    pub range: Option<RangeConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

/// Tolerance when deciding whether `stop` is reached by the last step.
const RANGE_TOLERANCE: f64 = 1e-9;

impl RangeConfig {
    /// `start, start + step, …` up to and including `stop`.
    pub fn expand(&self, axis: &str) -> Result<Vec<f64>, ParamError> {
        let invalid = || ParamError::InvalidRange {
            axis: axis.to_string(),
            start: self.start,
            stop: self.stop,
            step: self.step,
        };
        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            return Err(invalid());
        }
        if self.step <= 0.0 || self.stop < self.start {
            return Err(invalid());
        }
        let span = (self.stop - self.start) / self.step + RANGE_TOLERANCE;
        if span >= MAX_GRID_COMBINATIONS as f64 {
            return Err(ParamError::RangeTooLarge {
                axis: axis.to_string(),
                limit: MAX_GRID_COMBINATIONS,
            });
        }
        let steps = span.floor() as usize;
        Ok((0..=steps)
            .map(|i| round12(self.start + i as f64 * self.step))
            .collect())
    }
}

/// Strip accumulated floating noise (0.1 * 3 → 0.3).
fn round12(x: f64) -> f64 {
    (x * 1e12).round() / 1e12
}

impl AxisConfig {
    pub fn to_axis(&self) -> Result<Axis, ParamError> {
        let name = self.param.name();
        let values = match (&self.values, &self.range) {
            (Some(values), None) => values.clone(),
            (None, Some(range)) => range.expand(name)?,
            _ => {
                return Err(ParamError::AxisNotApplicable {
                    axis: name.to_string(),
                    reason: "give exactly one of `values` or `range`".to_string(),
                })
            }
        };
        Ok(Axis::new(self.param, values))
    }
}

/// The fixed (non-searched) part of a parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub signals: SignalParams,
    pub blend: Blend,
    /// Decide on the centered composite (`2f − 1`).
    #[serde(default)]
    pub center: bool,
    pub decision: DecisionMode,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        self.signals.validate()?;
        self.blend.validate()?;
        self.decision.validate()
    }
}

impl StudyConfig {
    /// Parse a study from TOML text. Relative data paths stay as written.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read a study file. Relative data paths resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(dir) = path.parent() {
            config.data.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Base strategy with the decision rule resolved.
    pub fn strategy(&self) -> Result<StrategyConfig, ConfigError> {
        Ok(StrategyConfig {
            signals: self.signals.clone(),
            blend: self.blend,
            center: self.composite.center,
            decision: self.decision.to_mode()?,
        })
    }

    pub fn evaluator(&self) -> PerformanceEvaluator {
        PerformanceEvaluator::new(
            self.data.frequency,
            self.backtest.return_space,
            self.backtest.annualize_sharpe,
        )
    }

    pub fn param_space(&self) -> Result<ParamSpace, ParamError> {
        let axes = self
            .grid
            .axes
            .iter()
            .map(AxisConfig::to_axis)
            .collect::<Result<Vec<_>, _>>()?;
        ParamSpace::new(axes)
    }

    /// Fail-fast check of everything except individual grid combinations,
    /// which the optimizer validates when it is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.validate()?;
        let strategy = self.strategy()?;
        strategy.validate()?;
        if strategy.blend.needs_econ() && !self.data.has_macro_source() {
            return Err(ConfigError::MissingMacroSource {
                blend: strategy.blend.name(),
            });
        }
        if matches!(strategy.decision, DecisionMode::Symmetric { .. }) && !strategy.center {
            return Err(ConfigError::UncenteredSymmetric);
        }
        self.objective.validate()?;
        self.param_space()?.check_applicable(&strategy)?;
        Ok(())
    }
}
