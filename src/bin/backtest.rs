use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use matchlab_engine::backtest;
use matchlab_engine::cli::{self, DataArgs};
use matchlab_engine::logging;
use matchlab_engine::report;

/// Rolling expanding-window backtest of the calibrated Poisson model.
#[derive(Parser)]
#[command(name = "backtest")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    /// Skip fixtures without a valid 1X2 quote
    #[arg(long)]
    require_odds: bool,

    /// Write the full metrics report here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write per-fixture market probabilities here
    #[arg(long)]
    predictions: Option<PathBuf>,
}

fn main() -> ExitCode {
    cli::load_env_files();
    let args = Cli::parse();
    logging::init(args.data.verbose);
    cli::run_main(|| run(args))
}

fn run(args: Cli) -> Result<()> {
    let mut cfg = args.data.engine_config()?;
    cfg.require_odds |= args.require_odds;
    cfg.collect_predictions |= args.predictions.is_some();
    let priors = args.data.league_priors()?;
    let matches = args.data.load_matches()?;

    let mut result = backtest::run_backtest(&matches, &priors, &cfg);

    print!("{}", report::format_backtest_summary(&result));

    if let Some(path) = &args.predictions {
        report::write_json(path, &result.predictions)?;
        info!("wrote {} prediction rows to {}", result.predictions.len(), path.display());
        result.predictions.clear();
    }
    if let Some(path) = &args.out {
        report::write_json(path, &result)?;
        info!("wrote report to {}", path.display());
    }
    Ok(())
}
