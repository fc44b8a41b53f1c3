use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;

use matchlab_engine::cli::{self, DataArgs};
use matchlab_engine::context_edge::{self, ContextSignal, OddsBands};
use matchlab_engine::logging;
use matchlab_engine::report;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ContextArg {
    Rest,
    Congestion,
    /// Unconditional max-edge betting
    None,
}

/// Threshold sweep of logit edges against de-vigged market prices.
#[derive(Parser)]
#[command(name = "edge_sweep")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    #[arg(long, value_enum, default_value_t = ContextArg::None)]
    context: ContextArg,

    /// Back max-edge picks only inside the tuned per-side odds bands
    /// (ignored when the config file already sets `odds_bands`)
    #[arg(long)]
    odds_bands: bool,

    /// Write the sweep report here
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
    let mut cfg = args.data.engine_config()?;
    if args.odds_bands && cfg.odds_bands.is_none() {
        cfg.odds_bands = Some(OddsBands::tuned());
    }
    let priors = args.data.league_priors()?;
    let matches = args.data.load_matches()?;

    let sweep = match args.context {
        ContextArg::Rest => {
            context_edge::run_context_sweep(&matches, ContextSignal::Rest, &priors, &cfg)
        }
        ContextArg::Congestion => {
            context_edge::run_context_sweep(&matches, ContextSignal::Congestion, &priors, &cfg)
        }
        ContextArg::None => context_edge::run_edge_sweep(&matches, &priors, &cfg),
    };

    print!("{}", report::format_sweep_table(&sweep));

    if let Some(path) = &args.out {
        report::write_json(path, &sweep)?;
        info!("wrote sweep to {}", path.display());
    }
    Ok(())
}
