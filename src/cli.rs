use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::fake_season::{self, FakeSeasonConfig};
use crate::historical_dataset::{self, MatchRecord};
use crate::league_params::LeaguePriors;

/// Input and configuration flags shared by every binary.
#[derive(Debug, Clone, Args)]
pub struct DataArgs {
    /// Archive root: one folder per league holding football-data CSV files
    #[arg(long, env = "MATCHLAB_DATA_ROOT")]
    pub data: Option<PathBuf>,

    /// Use a synthetic season instead of an archive
    #[arg(long)]
    pub demo: bool,

    /// Seasons to synthesize with --demo
    #[arg(long, default_value_t = 3)]
    pub demo_seasons: usize,

    /// Restrict the run to one league id (e.g. ENG1)
    #[arg(long)]
    pub league: Option<String>,

    /// Engine config JSON; omitted keys keep their defaults
    #[arg(long, env = "MATCHLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// League prior overrides JSON
    #[arg(long, env = "MATCHLAB_PRIORS")]
    pub priors: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl DataArgs {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::load(self.config.as_deref())
    }

    pub fn league_priors(&self) -> Result<LeaguePriors> {
        let mut priors = LeaguePriors::default();
        if let Some(path) = &self.priors {
            let n = priors.load_overrides(path)?;
            info!("loaded {n} league prior overrides from {}", path.display());
        }
        Ok(priors)
    }

    /// Chronologically ordered fixtures from the archive or the synthetic generator.
    pub fn load_matches(&self) -> Result<Vec<MatchRecord>> {
        let matches = if self.demo {
            let cfg = FakeSeasonConfig {
                league: self.league.clone().unwrap_or_else(|| "ENG1".to_string()),
                seasons: self.demo_seasons.max(1),
                ..FakeSeasonConfig::default()
            };
            fake_season::generate(&cfg)
        } else {
            let root = self
                .data
                .as_ref()
                .ok_or_else(|| anyhow!("no archive given; pass --data <root> or --demo"))?;
            historical_dataset::import_archive_root(root)
                .with_context(|| format!("import archive {}", root.display()))?
        };

        let matches = match &self.league {
            Some(league) if !self.demo => historical_dataset::filter_league(&matches, league),
            _ => matches,
        };
        if matches.is_empty() {
            return Err(anyhow!("archive produced no fixtures"));
        }
        info!(matches = matches.len(), "fixtures loaded");
        Ok(matches)
    }
}

/// Loads `.env.local` then `.env`; existing variables win.
pub fn load_env_files() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// Runs a binary body, logging any error as fatal and mapping it to a failing exit code.
pub fn run_main(body: impl FnOnce() -> Result<()>) -> ExitCode {
    match body() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("FATAL: {err:#}");
            ExitCode::FAILURE
        }
    }
}
