use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

use matchlab_engine::cli::{self, DataArgs};
use matchlab_engine::historical_dataset;
use matchlab_engine::league_params;
use matchlab_engine::logging;

/// Prints the league prior registry, or fits priors from an archive.
#[derive(Parser)]
#[command(name = "league_priors")]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    /// Estimate priors from the archive instead of printing the registry
    #[arg(long)]
    fit: bool,

    /// Where --fit writes the override table
    #[arg(long, default_value = "data/league_priors.json")]
    out: PathBuf,
}

fn main() -> ExitCode {
    cli::load_env_files();
    let args = Cli::parse();
    logging::init(args.data.verbose);
    cli::run_main(|| run(args))
}

fn run(args: Cli) -> Result<()> {
    let mut priors = args.data.league_priors()?;

    if !args.fit {
        let d = priors.default;
        println!(
            "default mean_goals={:.2} home_adv={:+.3} sigma={:.2} floor={:.2}",
            d.mean_goals, d.home_advantage, d.sigma_team, d.floor_rate
        );
        let mut ids: Vec<_> = priors.leagues.keys().cloned().collect();
        ids.sort();
        for id in ids {
            let p = priors.get_prior(&id);
            println!(
                "{id} mean_goals={:.2} home_adv={:+.3} sigma={:.2} floor={:.2}",
                p.mean_goals, p.home_advantage, p.sigma_team, p.floor_rate
            );
        }
        return Ok(());
    }

    let matches = args.data.load_matches()?;
    let mut leagues = historical_dataset::league_ids(&matches);
    leagues.sort();
    if leagues.is_empty() {
        return Err(anyhow!("archive holds no leagues to fit"));
    }

    for league in leagues {
        let rows = historical_dataset::filter_league(&matches, &league);
        let (prior, n) = league_params::estimate_prior(&priors, &league, &rows);
        if n < 200 {
            warn!("{league}: only {n} fixtures, estimate leans on the default");
        }
        println!(
            "{league} n={n} mean_goals={:.3} home_adv={:+.4}",
            prior.mean_goals, prior.home_advantage
        );
        priors.leagues.insert(league, prior);
    }

    priors.save(&args.out)?;
    info!("wrote league priors to {}", args.out.display());
    Ok(())
}
