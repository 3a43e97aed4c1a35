//! QuantML CLI: backtest, sweep and signal export commands.
//!
//! Commands:
//! - `backtest`: run the study's configured strategy once and print its report
//! - `sweep`: grid-search the study's axes and write the result grid
//! - `signals`: write the composite signal of the configured strategy as CSV

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use quantml_runner::export::{normalized_series, series_to_csv};
use quantml_runner::grid::GridResult;
use quantml_runner::{
    run_backtest, run_sweep, write_backtest_artifacts, write_sweep_artifacts, PerformanceReport, StudyConfig,
    SweepOptions, SweepOutcome,
};

#[derive(Parser)]
#[command(
    name = "quantml",
    about = "QuantML CLI: probability-signal backtests and grid search"
)]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured strategy once.
    Backtest {
        /// Path to a study TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for report, signal and equity files.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Grid-search the study's axes.
    Sweep {
        /// Path to a study TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Output directory for the grid CSV and best-result JSON.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Number of top combinations to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Stop starting new combinations after this many seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,
    },
    /// Write the configured strategy's composite signal as CSV.
    Signals {
        /// Path to a study TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Destination CSV file.
        #[arg(long)]
        output: PathBuf,

        /// Rescale the composite onto [0, 1] before writing.
        #[arg(long)]
        normalize: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Commands::Backtest { config, output_dir } => run_backtest_cmd(&config, &output_dir),
        Commands::Sweep {
            config,
            output_dir,
            top,
            deadline_secs,
        } => run_sweep_cmd(&config, &output_dir, top, deadline_secs),
        Commands::Signals {
            config,
            output,
            normalize,
        } => run_signals_cmd(&config, &output, normalize),
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to install tracing subscriber")
}

fn load_config(path: &Path) -> Result<StudyConfig> {
    StudyConfig::load(path).with_context(|| format!("failed to load study {}", path.display()))
}

fn run_backtest_cmd(config_path: &Path, output_dir: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let outcome = run_backtest(&config)?;

    println!();
    println!("=== Backtest Result ===");
    println!("Study:          {}", &outcome.fingerprint[..12.min(outcome.fingerprint.len())]);
    println!("Blend:          {}", outcome.strategy.blend.name());
    println!("Decision:       {}", outcome.strategy.decision.name());
    print_report(&outcome.output.report);
    if outcome.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }

    let written = write_backtest_artifacts(output_dir, &outcome)?;
    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_sweep_cmd(config_path: &Path, output_dir: &Path, top: usize, deadline_secs: Option<u64>) -> Result<()> {
    let config = load_config(config_path)?;
    let options = SweepOptions {
        time_budget: deadline_secs.map(Duration::from_secs),
    };
    let sweep = run_sweep(&config, options)?;

    print_sweep(&sweep, top);

    let written = write_sweep_artifacts(output_dir, &sweep)?;
    println!();
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_signals_cmd(config_path: &Path, output: &Path, normalize: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let outcome = run_backtest(&config)?;
    let composite = if normalize {
        normalized_series(&outcome.output.composite)?
    } else {
        outcome.output.composite.clone()
    };
    let csv = series_to_csv(&composite)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, csv).with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} ({} points, {} defined)",
        output.display(),
        composite.len(),
        composite.defined_count()
    );
    Ok(())
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(x) => format!("{x:.precision$}"),
        None => "undefined".to_string(),
    }
}

fn print_report(report: &PerformanceReport) {
    println!("Periods:        {}", report.periods);
    println!();
    println!("--- Performance ---");
    println!("Cumulative:     {:.2}%", report.cumulative_return * 100.0);
    println!("Annualized:     {:.2}%", report.annualized_return * 100.0);
    println!("Sharpe:         {}", fmt_opt(report.sharpe_ratio, 3));
    println!("Max Drawdown:   {:.2}%", report.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", report.win_rate * 100.0);
    println!("Win/Loss:       {}", fmt_opt(report.win_loss_ratio, 3));
}

fn describe(row: &GridResult) -> String {
    row.params
        .iter()
        .map(|pv| format!("{}={}", pv.param, pv.value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_sweep(sweep: &SweepOutcome, top: usize) {
    let grid = &sweep.grid;
    println!();
    println!("=== Grid Search ===");
    println!("Combinations:   {}", grid.len());
    println!("Scored:         {}", grid.scored_count());
    println!("Skipped:        {}", grid.skipped_count());

    match &grid.best {
        Some(best) => {
            println!();
            println!("--- Best (#{}, score {:.4}) ---", best.index, best.score);
            if let Some(row) = grid.full_grid.get(best.index) {
                println!("Params:         {}", describe(row));
            }
            print_report(&best.report);
        }
        None => {
            println!();
            println!("No combination produced a defined score.");
        }
    }

    let ranked = grid.top_n(top);
    if !ranked.is_empty() {
        println!();
        println!("--- Top {} ---", ranked.len());
        for row in ranked {
            println!(
                "#{:<5} score {:>8}  sharpe {:>8}  {}",
                row.index,
                fmt_opt(row.score, 4),
                fmt_opt(row.sharpe(), 3),
                describe(row)
            );
        }
    }
    if sweep.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
