//! Result export: CSV tables and JSON reports.
//!
//! - **grid CSV**: one row per combination, one column per axis
//! - **signal CSV**: `date,value`, an empty cell where undefined
//! - **JSON**: performance reports and the best combination
//!
//! Artifact file names carry the first 12 hex digits of the study
//! fingerprint so reruns of the same study overwrite their own files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use quantml_core::math::min_max_normalize;
use quantml_core::TimeSeries;

use crate::grid::GridOutcome;
use crate::metrics::PerformanceReport;
use crate::runner::{BacktestOutcome, SweepOutcome};

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6}")).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Full result grid as CSV, in enumeration order.
///
/// Columns: index, <one per axis>, sharpe, win_rate, win_loss_ratio,
/// cumulative_return, max_drawdown, score, skipped
pub fn grid_to_csv(outcome: &GridOutcome) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["index".to_string()];
    header.extend(outcome.axes.iter().map(|p| p.name().to_string()));
    header.extend(
        [
            "sharpe",
            "win_rate",
            "win_loss_ratio",
            "cumulative_return",
            "max_drawdown",
            "score",
            "skipped",
        ]
        .map(String::from),
    );
    wtr.write_record(&header)?;

    for row in &outcome.full_grid {
        let mut record = vec![row.index.to_string()];
        record.extend(outcome.axes.iter().map(|p| fmt_opt(row.value_of(*p))));
        let report = row.report.as_ref();
        record.push(fmt_opt(row.sharpe()));
        record.push(fmt_opt(row.win_rate()));
        record.push(fmt_opt(report.and_then(|r| r.win_loss_ratio)));
        record.push(fmt_opt(report.map(|r| r.cumulative_return)));
        record.push(fmt_opt(report.map(|r| r.max_drawdown)));
        record.push(fmt_opt(row.score));
        record.push(row.skipped.to_string());
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().context("failed to flush grid CSV")?;
    String::from_utf8(bytes).context("grid CSV is not UTF-8")
}

/// A dated series as `date,value` CSV.
pub fn series_to_csv(series: &TimeSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "value"])?;
    for (date, value) in series.iter() {
        wtr.write_record([date.to_string(), fmt_opt(value)])?;
    }
    let bytes = wtr.into_inner().context("failed to flush series CSV")?;
    String::from_utf8(bytes).context("series CSV is not UTF-8")
}

/// `series` rescaled onto `[0, 1]` over its defined values, for plotting
/// composites of different blends on one axis.
pub fn normalized_series(series: &TimeSeries) -> Result<TimeSeries> {
    TimeSeries::new(series.dates().to_vec(), min_max_normalize(series.values()))
        .context("failed to rebuild normalized series")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn report_to_json(report: &PerformanceReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize PerformanceReport")
}

#[derive(Serialize)]
struct BestSummary<'a> {
    fingerprint: &'a str,
    synthetic: bool,
    combinations: usize,
    scored: usize,
    skipped: usize,
    best: Option<&'a crate::grid::BestResult>,
}

/// Best combination plus grid counts as pretty JSON.
pub fn best_to_json(sweep: &SweepOutcome) -> Result<String> {
    let summary = BestSummary {
        fingerprint: &sweep.fingerprint,
        synthetic: sweep.has_synthetic,
        combinations: sweep.grid.len(),
        scored: sweep.grid.scored_count(),
        skipped: sweep.grid.skipped_count(),
        best: sweep.grid.best.as_ref(),
    };
    serde_json::to_string_pretty(&summary).context("failed to serialize best result")
}

// ─── Artifact files ─────────────────────────────────────────────────

fn short_id(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

fn write(dir: &Path, name: String, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes `grid_<id>.csv` and `best_<id>.json`.
pub fn write_sweep_artifacts(dir: &Path, sweep: &SweepOutcome) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let id = short_id(&sweep.fingerprint);
    Ok(vec![
        write(dir, format!("grid_{id}.csv"), &grid_to_csv(&sweep.grid)?)?,
        write(dir, format!("best_{id}.json"), &best_to_json(sweep)?)?,
    ])
}

/// Writes `report_<id>.json`, `signal_<id>.csv` and `equity_<id>.csv`.
pub fn write_backtest_artifacts(dir: &Path, outcome: &BacktestOutcome) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let id = short_id(&outcome.fingerprint);
    let out = &outcome.output;
    Ok(vec![
        write(dir, format!("report_{id}.json"), &report_to_json(&out.report)?)?,
        write(dir, format!("signal_{id}.csv"), &series_to_csv(&out.composite)?)?,
        write(dir, format!("equity_{id}.csv"), &series_to_csv(&out.backtest.equity_series())?)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridResult, Param, ParamValue};
    use chrono::NaiveDate;
    use quantml_core::ReturnSpace;

    fn report() -> PerformanceReport {
        PerformanceReport {
            cumulative_return: 0.12,
            annualized_return: 0.05,
            sharpe_ratio: Some(1.1),
            max_drawdown: -0.04,
            win_rate: 0.55,
            win_loss_ratio: None,
            periods: 100,
            return_space: ReturnSpace::Log,
        }
    }

    #[test]
    fn grid_csv_has_axis_columns() {
        let outcome = GridOutcome {
            axes: vec![Param::Threshold, Param::LambdaMa],
            best: None,
            full_grid: vec![
                GridResult {
                    index: 0,
                    params: vec![
                        ParamValue {
                            param: Param::Threshold,
                            value: 0.5,
                        },
                        ParamValue {
                            param: Param::LambdaMa,
                            value: 2.0,
                        },
                    ],
                    report: Some(report()),
                    score: Some(0.935),
                    skipped: false,
                },
                GridResult {
                    index: 1,
                    params: vec![],
                    report: None,
                    score: None,
                    skipped: true,
                },
            ],
        };
        let csv = grid_to_csv(&outcome).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "index,threshold,lambda_ma,sharpe,win_rate,win_loss_ratio,cumulative_return,max_drawdown,score,skipped"
        );
        assert_eq!(
            lines[1],
            "0,0.500000,2.000000,1.100000,0.550000,,0.120000,-0.040000,0.935000,false"
        );
        assert_eq!(lines[2], "1,,,,,,,,,true");
    }

    #[test]
    fn series_csv_leaves_undefined_empty() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let s = TimeSeries::new(vec![d, d.succ_opt().unwrap()], vec![None, Some(0.25)]).unwrap();
        let csv = series_to_csv(&s).unwrap();
        assert_eq!(csv, "date,value\n2020-01-01,\n2020-01-02,0.250000\n");
    }

    #[test]
    fn normalized_series_spans_unit_interval() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..4).map(|i| d + chrono::Duration::days(i)).collect();
        let s = TimeSeries::new(dates.clone(), vec![None, Some(-0.4), Some(0.6), Some(0.1)]).unwrap();
        let n = normalized_series(&s).unwrap();
        assert_eq!(n.dates(), dates.as_slice());
        assert_eq!(n.values(), &[None, Some(0.0), Some(1.0), Some(0.5)]);
        let csv = series_to_csv(&n).unwrap();
        assert!(csv.ends_with("2020-01-04,0.500000\n"));
    }

    #[test]
    fn report_json_uses_null_for_undefined() {
        let json = report_to_json(&report()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(v["win_loss_ratio"].is_null());
        assert_eq!(v["return_space"], "log");
    }
}
