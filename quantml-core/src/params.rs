//! Parameter validation.
//!
//! Every signal, blend and decision parameter is checked before any series
//! is touched. A grid search validates every combination up front, so an
//! invalid value is reported at configuration time, never mid-search.

use thiserror::Error;

/// A configured value outside its domain.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("{name} must be a finite number, got {value}")]
    NonFinite { name: String, value: f64 },

    #[error("{name} must be > 0, got {value}")]
    NonPositive { name: String, value: f64 },

    #[error("{name} must be >= 1")]
    ZeroWindow { name: String },

    #[error("{name} must be a whole number of periods, got {value}")]
    FractionalWindow { name: String, value: f64 },

    #[error("short_window ({short}) must be < long_window ({long})")]
    WindowOrder { short: usize, long: usize },

    #[error("{name} must lie in [0, 1], got {value}")]
    OutsideUnitInterval { name: String, value: f64 },

    #[error("{name} must lie strictly between 0 and 1, got {value}")]
    OutsideOpenUnitInterval { name: String, value: f64 },

    #[error("grid axis '{axis}' has no values")]
    EmptyAxis { axis: String },

    #[error("grid axis '{axis}' is declared more than once")]
    DuplicateAxis { axis: String },

    #[error("grid axis '{axis}' does not apply: {reason}")]
    AxisNotApplicable { axis: String, reason: String },

    #[error("invalid range for '{axis}': start={start}, stop={stop}, step={step}")]
    InvalidRange {
        axis: String,
        start: f64,
        stop: f64,
        step: f64,
    },

    #[error("range for '{axis}' expands to more than {limit} values")]
    RangeTooLarge { axis: String, limit: usize },

    #[error("grid has more than {limit} combinations")]
    GridTooLarge { limit: usize },

    #[error("grid combination #{index} is invalid: {source}")]
    Combination {
        index: usize,
        #[source]
        source: Box<ParamError>,
    },
}

pub fn finite(name: &str, value: f64) -> Result<(), ParamError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::NonFinite {
            name: name.to_string(),
            value,
        })
    }
}

/// Scaling factors (λ) must be finite and strictly positive.
pub fn check_positive(name: &str, value: f64) -> Result<(), ParamError> {
    finite(name, value)?;
    if value <= 0.0 {
        return Err(ParamError::NonPositive {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

pub fn check_window(name: &str, window: usize) -> Result<(), ParamError> {
    if window == 0 {
        return Err(ParamError::ZeroWindow {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Weights and thresholds live in `[0, 1]`.
pub fn check_unit(name: &str, value: f64) -> Result<(), ParamError> {
    finite(name, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ParamError::OutsideUnitInterval {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

/// Quantile levels live in `(0, 1)`.
pub fn check_open_unit(name: &str, value: f64) -> Result<(), ParamError> {
    finite(name, value)?;
    if value <= 0.0 || value >= 1.0 {
        return Err(ParamError::OutsideOpenUnitInterval {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

/// Convert a grid value into a window length.
pub fn window_from_f64(name: &str, value: f64) -> Result<usize, ParamError> {
    finite(name, value)?;
    if value.fract() != 0.0 {
        return Err(ParamError::FractionalWindow {
            name: name.to_string(),
            value,
        });
    }
    if value < 1.0 {
        return Err(ParamError::ZeroWindow {
            name: name.to_string(),
        });
    }
    Ok(value as usize)
}
