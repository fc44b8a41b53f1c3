use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::info;

use matchlab_engine::backtest::{self, BacktestReport};
use matchlab_engine::cli::{self, DataArgs};
use matchlab_engine::logging;
use matchlab_engine::report;

/// One independent rolling backtest per league, run in parallel.
#[derive(Parser)]
#[command(name = "multi_backtest")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    /// Write every league report here
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    cli::load_env_files();
    let args = Cli::parse();
    logging::init(args.data.verbose);
    cli::run_main(|| run(args))
}

fn run(args: Cli) -> Result<()> {
    let cfg = args.data.engine_config()?;
    let priors = args.data.league_priors()?;
    let matches = args.data.load_matches()?;

    let reports = backtest::run_backtest_by_league(&matches, &priors, &cfg);
    if reports.iter().all(|(_, r)| r.evaluated == 0) {
        return Err(anyhow!("no league had enough fixtures to evaluate"));
    }

    println!("Multi-league rolling backtest");
    println!("Leagues: {}", reports.len());
    println!();
    for (league, r) in &reports {
        let g = &r.model.global;
        println!(
            "league {league} samples={} brier={:.4} logloss={:.4} ece={:.4} skipped={}",
            g.samples,
            g.brier.unwrap_or(f64::NAN),
            g.logloss.unwrap_or(f64::NAN),
            g.ece.unwrap_or(f64::NAN),
            r.skipped.total()
        );
    }

    let total: usize = reports.iter().map(|(_, r)| r.model.global.samples).sum();
    println!();
    println!(
        "aggregate samples={total} brier={:.4} logloss={:.4}",
        weighted_mean(&reports, total, |r| r.model.global.brier),
        weighted_mean(&reports, total, |r| r.model.global.logloss)
    );

    if let Some(path) = &args.out {
        report::write_json(path, &reports)?;
        info!("wrote {} league reports to {}", reports.len(), path.display());
    }
    Ok(())
}

fn weighted_mean(
    reports: &[(String, BacktestReport)],
    total: usize,
    value: impl Fn(&BacktestReport) -> Option<f64>,
) -> f64 {
    if total == 0 {
        return f64::NAN;
    }
    let sum: f64 = reports
        .iter()
        .filter_map(|(_, r)| value(r).map(|v| v * r.model.global.samples as f64))
        .sum();
    sum / total as f64
}
