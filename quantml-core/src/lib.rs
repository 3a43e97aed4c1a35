//! QuantML Core: signal math, probability signals, blending, backtest.
//!
//! This crate is pure computation over dated series:
//! - `TimeSeries` with explicit undefined entries, joins and resampling
//! - Numeric primitives (sigmoid, standardization, rolling statistics)
//! - The P_MA, P_Risk and P_Econ probability signals
//! - Linear blends into a composite score
//! - A lagged, lookahead-free backtest simulator
//!
//! No file I/O and no logging happen here; see `quantml-runner`.

pub mod backtest;
pub mod combine;
pub mod math;
pub mod params;
pub mod series;
pub mod signals;

pub use backtest::{BacktestRun, BacktestSimulator, DecisionMode, Position};
pub use combine::Blend;
pub use math::ReturnSpace;
pub use params::ParamError;
pub use series::{Resample, SeriesError, TimeSeries};
pub use signals::{
    EconProbability, MaProbability, ProbabilitySignal, RiskProbability, SignalInputs, SignalParams,
    SignalSet,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: every public value type can cross threads, so
    /// grid combinations can be evaluated on a worker pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<TimeSeries>();
        require_sync::<TimeSeries>();
        require_send::<SignalParams>();
        require_sync::<SignalParams>();
        require_send::<SignalSet>();
        require_sync::<SignalSet>();
        require_send::<Blend>();
        require_sync::<Blend>();
        require_send::<DecisionMode>();
        require_sync::<DecisionMode>();
        require_send::<BacktestSimulator>();
        require_sync::<BacktestSimulator>();
        require_send::<BacktestRun>();
        require_sync::<BacktestRun>();
        require_send::<ParamError>();
        require_sync::<ParamError>();
    }

    /// Generators are usable as trait objects.
    #[test]
    fn generators_are_object_safe() {
        let gens: Vec<Box<dyn ProbabilitySignal>> = vec![
            Box::new(MaProbability::default()),
            Box::new(RiskProbability::default()),
            Box::new(EconProbability::default()),
        ];
        let names: Vec<&str> = gens.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["p_ma", "p_risk", "p_econ"]);
        assert!(gens.iter().all(|g| g.validate().is_ok()));
    }
}
