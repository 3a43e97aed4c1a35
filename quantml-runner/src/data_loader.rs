//! Series loading for the runner.
//!
//! Price and macro series come from CSV files, or from deterministic
//! synthetic generators when `data.synthetic` is set. Synthetic data is a
//! developer mode: results produced on it are tagged.
//!
//! CSV layout: the first column is the date; the value column is chosen by
//! name, falling back to `Adj Close`, `Close`, `value`, then the second
//! column. Cells that do not parse become undefined values.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{info, warn};

use quantml_core::{SeriesError, TimeSeries};

use crate::config::DataConfig;
use crate::metrics::Frequency;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{label}': {source}")]
    Csv {
        label: String,
        #[source]
        source: csv::Error,
    },

    #[error("'{label}' has no column named '{column}'")]
    MissingColumn { label: String, column: String },

    #[error("'{label}' needs a date column and a value column")]
    TooFewColumns { label: String },

    #[error("'{label}' line {line}: cannot parse date '{value}'")]
    BadDate {
        label: String,
        line: usize,
        value: String,
    },

    #[error("'{label}' contains no rows")]
    Empty { label: String },

    #[error("'{label}': {source}")]
    Series {
        label: String,
        #[source]
        source: SeriesError,
    },
}

/// Where a loaded series came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic,
}

/// A named series plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSeries {
    pub name: String,
    pub series: TimeSeries,
    pub source: DataSource,
}

/// Everything a study reads.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub price: LoadedSeries,
    pub gdp: Option<LoadedSeries>,
    pub rate: Option<LoadedSeries>,
    /// BLAKE3 over every loaded date and value.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

const DEFAULT_VALUE_COLUMNS: [&str; 3] = ["Adj Close", "Close", "value"];

/// Load the series a study configuration names.
pub fn load_study_data(data: &DataConfig) -> Result<LoadedData, LoadError> {
    let (price, gdp, rate) = if data.synthetic {
        let (start, end) = data.synthetic_window();
        warn!(%start, %end, "using synthetic data; results are tagged synthetic");
        (
            synthetic("price", synthetic_price("price", start, end, data.frequency)),
            Some(synthetic("gdp", synthetic_gdp(start, end))),
            Some(synthetic("rate", synthetic_rate(start, end))),
        )
    } else {
        let price = match &data.price_csv {
            Some(path) => from_csv("price", path, data.price_column.as_deref())?,
            None => {
                return Err(LoadError::Empty {
                    label: "price".to_string(),
                })
            }
        };
        let gdp = data
            .gdp_csv
            .as_deref()
            .map(|p| from_csv("gdp", p, data.gdp_column.as_deref()))
            .transpose()?;
        let rate = data
            .rate_csv
            .as_deref()
            .map(|p| from_csv("rate", p, data.rate_column.as_deref()))
            .transpose()?;
        (trim(price, data), gdp, rate)
    };

    let has_synthetic = [Some(&price), gdp.as_ref(), rate.as_ref()]
        .into_iter()
        .flatten()
        .any(|s| s.source == DataSource::Synthetic);
    let dataset_hash = compute_dataset_hash([Some(&price), gdp.as_ref(), rate.as_ref()].into_iter().flatten());

    info!(
        price_points = price.series.len(),
        macro_series = gdp.is_some() && rate.is_some(),
        has_synthetic,
        "study data loaded"
    );

    Ok(LoadedData {
        price,
        gdp,
        rate,
        dataset_hash,
        has_synthetic,
    })
}

fn synthetic(name: &str, series: TimeSeries) -> LoadedSeries {
    LoadedSeries {
        name: name.to_string(),
        series,
        source: DataSource::Synthetic,
    }
}

fn from_csv(name: &str, path: &Path, column: Option<&str>) -> Result<LoadedSeries, LoadError> {
    Ok(LoadedSeries {
        name: name.to_string(),
        series: load_csv_series(path, column)?,
        source: DataSource::Csv(path.to_path_buf()),
    })
}

/// Macro series keep their full history so interpolation has bracketing
/// points; only the price axis is trimmed.
fn trim(mut price: LoadedSeries, data: &DataConfig) -> LoadedSeries {
    if data.start.is_some() || data.end.is_some() {
        let start = data.start.unwrap_or(NaiveDate::MIN);
        let end = data.end.unwrap_or(NaiveDate::MAX);
        price.series = price.series.slice_dates(start, end);
    }
    price
}

/// Read one dated series from a CSV file.
pub fn load_csv_series(path: &Path, column: Option<&str>) -> Result<TimeSeries, LoadError> {
    let label = path.display().to_string();
    let reader = csv::Reader::from_path(path).map_err(|source| LoadError::Csv {
        label: label.clone(),
        source,
    })?;
    read_series(reader, column, &label)
}

/// Parse a dated series from any CSV source. `label` names the source in
/// errors.
pub fn parse_csv_series<R: Read>(input: R, column: Option<&str>, label: &str) -> Result<TimeSeries, LoadError> {
    read_series(csv::Reader::from_reader(input), column, label)
}

fn read_series<R: Read>(mut reader: csv::Reader<R>, column: Option<&str>, label: &str) -> Result<TimeSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        label: label.to_string(),
        source,
    };
    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.len() < 2 {
        return Err(LoadError::TooFewColumns {
            label: label.to_string(),
        });
    }
    let value_idx = value_column_index(&headers, column).ok_or_else(|| LoadError::MissingColumn {
        label: label.to_string(),
        column: column.unwrap_or_default().to_string(),
    })?;

    let mut rows: Vec<(NaiveDate, Option<f64>)> = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| LoadError::BadDate {
            label: label.to_string(),
            line: i + 2,
            value: raw_date.to_string(),
        })?;
        rows.push((date, record.get(value_idx).and_then(parse_value)));
    }
    if rows.is_empty() {
        return Err(LoadError::Empty {
            label: label.to_string(),
        });
    }

    // Some providers write newest first.
    rows.sort_by_key(|(d, _)| *d);
    let (dates, values) = rows.into_iter().unzip();
    TimeSeries::new(dates, values).map_err(|source| LoadError::Series {
        label: label.to_string(),
        source,
    })
}

fn value_column_index(headers: &csv::StringRecord, column: Option<&str>) -> Option<usize> {
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);
    match column {
        Some(name) => find(name),
        None => DEFAULT_VALUE_COLUMNS
            .iter()
            .find_map(|name| find(name))
            .or(Some(1)),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
        .or_else(|| NaiveDate::parse_from_str(raw, "%m/%d/%Y").ok())
}

fn parse_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Deterministic BLAKE3 hash over names, dates and values, in load order.
fn compute_dataset_hash<'a>(series: impl Iterator<Item = &'a LoadedSeries>) -> String {
    let mut hasher = blake3::Hasher::new();
    for s in series {
        hasher.update(s.name.as_bytes());
        for (date, value) in s.series.iter() {
            hasher.update(date.to_string().as_bytes());
            match value {
                Some(v) => hasher.update(&v.to_le_bytes()),
                None => hasher.update(b"-"),
            };
        }
    }
    hasher.finalize().to_hex().to_string()
}

// ─── Synthetic series ───────────────────────────────────────────────

fn seeded_rng(name: &str) -> StdRng {
    let seed: [u8; 32] = *blake3::hash(name.as_bytes()).as_bytes();
    StdRng::from_seed(seed)
}

fn step_dates(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        match frequency {
            Frequency::Daily => {
                let weekday = current.weekday();
                if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
                    dates.push(current);
                }
                current += chrono::Duration::days(1);
            }
            Frequency::Weekly => {
                dates.push(current);
                current += chrono::Duration::days(7);
            }
            Frequency::Monthly => {
                dates.push(current);
                match current.checked_add_months(chrono::Months::new(1)) {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
    }
    dates
}

/// Random-walk price starting at 100, seeded from `name`.
pub fn synthetic_price(name: &str, start: NaiveDate, end: NaiveDate, frequency: Frequency) -> TimeSeries {
    let mut rng = seeded_rng(name);
    let (drift, spread) = match frequency {
        Frequency::Daily => (0.0003, 0.02),
        Frequency::Weekly => (0.0015, 0.045),
        Frequency::Monthly => (0.006, 0.09),
    };
    let dates = step_dates(start, end, frequency);
    let mut price = 100.0_f64;
    let values = dates
        .iter()
        .map(|_| {
            let v = price;
            let r: f64 = rng.gen_range(-spread..spread) + drift;
            price *= 1.0 + r;
            Some(v)
        })
        .collect();
    TimeSeries::new(dates, values).unwrap_or_default()
}

fn quarter_start(date: NaiveDate) -> NaiveDate {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Quarterly GDP growth (percent, annualized) with a slow business cycle.
pub fn synthetic_gdp(start: NaiveDate, end: NaiveDate) -> TimeSeries {
    let mut rng = seeded_rng("gdp");
    let mut dates = Vec::new();
    let mut current = quarter_start(start);
    while current <= end {
        dates.push(current);
        match current.checked_add_months(chrono::Months::new(3)) {
            Some(next) => current = next,
            None => break,
        }
    }
    let values = (0..dates.len())
        .map(|i| {
            let cycle = (i as f64 * std::f64::consts::TAU / 28.0).sin() * 1.5;
            Some(2.0 + cycle + rng.gen_range(-0.8..0.8))
        })
        .collect();
    TimeSeries::new(dates, values).unwrap_or_default()
}

/// Monthly policy-rate level (percent), a bounded random walk.
pub fn synthetic_rate(start: NaiveDate, end: NaiveDate) -> TimeSeries {
    let mut rng = seeded_rng("rate");
    let first = NaiveDate::from_ymd_opt(start.year(), start.month(), 1).unwrap_or(start);
    let dates = step_dates(first, end, Frequency::Monthly);
    let mut level = 2.0_f64;
    let values = dates
        .iter()
        .map(|_| {
            let v = level;
            level = (level + rng.gen_range(-0.25..0.25)).clamp(0.0, 8.0);
            Some(v)
        })
        .collect();
    TimeSeries::new(dates, values).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn prefers_adj_close() {
        let csv = "Date,Open,Close,Adj Close\n2020-01-02,1,2,3\n2020-01-03,1,2,4\n";
        let s = parse_csv_series(csv.as_bytes(), None, "t").unwrap();
        assert_eq!(s.values(), &[Some(3.0), Some(4.0)]);
    }

    #[test]
    fn falls_back_to_second_column() {
        let csv = "observation_date,GDP\n2020-01-01,\"21,481.4\"\n2020-04-01,.\n";
        let s = parse_csv_series(csv.as_bytes(), None, "gdp").unwrap();
        assert_eq!(s.values(), &[Some(21481.4), None]);
    }

    #[test]
    fn named_column_must_exist() {
        let csv = "Date,Close\n2020-01-02,1\n";
        let err = parse_csv_series(csv.as_bytes(), Some("Volume"), "t").unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { .. }));
    }

    #[test]
    fn newest_first_is_sorted() {
        let csv = "Date,Close\n2020-01-03,2\n2020-01-02,1\n";
        let s = parse_csv_series(csv.as_bytes(), None, "t").unwrap();
        assert_eq!(s.dates(), &[date(2020, 1, 2), date(2020, 1, 3)]);
    }

    #[test]
    fn duplicate_dates_rejected() {
        let csv = "Date,Close\n2020-01-02,1\n2020-01-02,2\n";
        let err = parse_csv_series(csv.as_bytes(), None, "t").unwrap_err();
        assert!(matches!(err, LoadError::Series { .. }));
    }

    #[test]
    fn bad_date_reports_line() {
        let csv = "Date,Close\n2020-01-02,1\nnot-a-date,2\n";
        match parse_csv_series(csv.as_bytes(), None, "t").unwrap_err() {
            LoadError::BadDate { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_datetime_and_us_dates() {
        assert_eq!(parse_date("2021-03-04 00:00:00"), Some(date(2021, 3, 4)));
        assert_eq!(parse_date("03/04/2021"), Some(date(2021, 3, 4)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Close\n2020-01-02,10\n2020-01-03,11").unwrap();
        let s = load_csv_series(file.path(), None).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn synthetic_is_deterministic() {
        let a = synthetic_price("SPY", date(2020, 1, 1), date(2020, 12, 31), Frequency::Daily);
        let b = synthetic_price("SPY", date(2020, 1, 1), date(2020, 12, 31), Frequency::Daily);
        let c = synthetic_price("QQQ", date(2020, 1, 1), date(2020, 12, 31), Frequency::Daily);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.get(0), Some(100.0));
        assert!(a.dates().iter().all(|d| d.weekday().number_from_monday() <= 5));
    }

    #[test]
    fn synthetic_frequencies() {
        let m = synthetic_price("x", date(2020, 1, 1), date(2020, 12, 31), Frequency::Monthly);
        assert_eq!(m.len(), 12);
        let gdp = synthetic_gdp(date(2020, 2, 15), date(2020, 12, 31));
        assert_eq!(gdp.dates()[0], date(2020, 1, 1));
        assert_eq!(gdp.len(), 4);
        let rate = synthetic_rate(date(2020, 1, 1), date(2020, 12, 31));
        assert_eq!(rate.len(), 12);
        assert!(rate.values().iter().flatten().all(|v| (0.0..=8.0).contains(v)));
    }

    #[test]
    fn synthetic_study_data_is_tagged() {
        let config = DataConfig {
            synthetic: true,
            frequency: Frequency::Monthly,
            ..DataConfig::default()
        };
        let a = load_study_data(&config).unwrap();
        let b = load_study_data(&config).unwrap();
        assert!(a.has_synthetic);
        assert!(a.gdp.is_some() && a.rate.is_some());
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert_eq!(a.price.series.len(), 120);
    }
}
