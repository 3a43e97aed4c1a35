//! Criterion benchmarks for the grid search hot loop.
//!
//! Run with: `cargo bench -p quantml-runner`
//!
//! - one pipeline evaluation (signals → blend → backtest → metrics)
//! - a full grid, parallel vs sequential

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quantml_core::{Blend, DecisionMode, SignalParams};
use quantml_runner::data_loader::synthetic_price;
use quantml_runner::{
    Axis, Frequency, GridOptimizer, Objective, Param, ParamSpace, PerformanceEvaluator, Pipeline, StrategyConfig,
    StudyInputs,
};

fn inputs(years: i32) -> StudyInputs {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2000 + years, 1, 1).unwrap();
    StudyInputs::price_only(synthetic_price("BENCH", start, end, Frequency::Daily))
}

fn base() -> StrategyConfig {
    StrategyConfig {
        signals: SignalParams::default(),
        blend: Blend::default(),
        center: false,
        decision: DecisionMode::bounded(0.55),
    }
}

/// Benchmark one combination across series lengths.
fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_evaluate");

    for years in [1, 5, 20].iter() {
        let inputs = inputs(*years);
        let pipeline = Pipeline::new(&inputs, PerformanceEvaluator::default());
        let strategy = base();

        group.bench_with_input(BenchmarkId::from_parameter(years), years, |b, _| {
            b.iter(|| {
                let _ = pipeline.evaluate(black_box(&strategy));
            });
        });
    }

    group.finish();
}

/// Benchmark a 6×5 grid over 5 years of daily data.
fn bench_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    let inputs = inputs(5);
    let pipeline = Pipeline::new(&inputs, PerformanceEvaluator::default());
    let space = ParamSpace::new(vec![
        Axis::new(Param::Threshold, vec![0.5, 0.52, 0.54, 0.56, 0.58, 0.6]),
        Axis::new(Param::LambdaRisk, vec![0.5, 1.0, 2.0, 4.0, 8.0]),
    ])
    .unwrap();

    for parallel in [true, false] {
        let optimizer = GridOptimizer::new(&space, &base(), Objective::default())
            .unwrap()
            .with_parallelism(parallel);
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| {
                let _ = optimizer.run(black_box(&pipeline));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_grid);
criterion_main!(benches);
