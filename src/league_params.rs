use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::historical_dataset::MatchRecord;
use crate::report;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaguePrior {
    pub mean_goals: f64,
    // Log-scale offset added to the home rate.
    pub home_advantage: f64,
    pub sigma_team: f64,
    pub floor_rate: f64,
}

pub const DEFAULT_PRIOR: LeaguePrior = LeaguePrior {
    mean_goals: 2.60,
    home_advantage: 0.15,
    sigma_team: 0.35,
    floor_rate: 0.25,
};

const fn prior(mean_goals: f64, home_advantage: f64) -> LeaguePrior {
    LeaguePrior {
        mean_goals,
        home_advantage,
        sigma_team: 0.35,
        floor_rate: 0.25,
    }
}

static BUILTIN_PRIORS: Lazy<HashMap<&'static str, LeaguePrior>> = Lazy::new(|| {
    HashMap::from([
        ("ENG1", prior(2.75, 0.15)),
        ("GER1", prior(2.95, 0.12)),
        ("ITA1", prior(2.55, 0.13)),
        ("SPA1", prior(2.60, 0.14)),
        ("FRA1", prior(2.70, 0.14)),
    ])
});

/// Built-in prior for `league_id`, or [`DEFAULT_PRIOR`] when the league is unmapped.
pub fn get_prior(league_id: &str) -> &'static LeaguePrior {
    BUILTIN_PRIORS.get(league_id).unwrap_or(&DEFAULT_PRIOR)
}

/// Read-only prior table for one run: built-ins plus optional overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaguePriors {
    pub default: LeaguePrior,
    pub leagues: HashMap<String, LeaguePrior>,
}

impl Default for LeaguePriors {
    fn default() -> Self {
        Self {
            default: DEFAULT_PRIOR,
            leagues: BUILTIN_PRIORS
                .iter()
                .map(|(id, p)| (id.to_string(), *p))
                .collect(),
        }
    }
}

impl LeaguePriors {
    pub fn get_prior(&self, league_id: &str) -> &LeaguePrior {
        self.leagues.get(league_id).unwrap_or(&self.default)
    }

    /// Overlays priors from a JSON map of league id to prior.
    pub fn load_overrides(&mut self, path: &Path) -> Result<usize> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read league priors {}", path.display()))?;
        let overrides: HashMap<String, LeaguePrior> = serde_json::from_str(&raw)
            .with_context(|| format!("parse league priors {}", path.display()))?;
        let n = overrides.len();
        self.leagues.extend(overrides);
        Ok(n)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        report::write_json(path, &self.leagues)
            .with_context(|| format!("save league priors {}", path.display()))
    }
}

/// Offline prior estimate from one league's archive.
///
/// Mean total goals and the log home/away scoring ratio are shrunk toward the league's
/// current entry in `priors` until the league has `MIN_N` matches. Not used inside the
/// rolling loop.
pub fn estimate_prior(
    priors: &LeaguePriors,
    league_id: &str,
    matches: &[MatchRecord],
) -> (LeaguePrior, usize) {
    const MIN_N: f64 = 200.0;

    let mut home_goals = 0.0;
    let mut away_goals = 0.0;
    let mut n = 0usize;
    for m in matches.iter().filter(|m| m.league == league_id) {
        home_goals += m.home_goals as f64;
        away_goals += m.away_goals as f64;
        n += 1;
    }

    let base = *priors.get_prior(league_id);
    if n == 0 {
        return (base, 0);
    }

    let mean_goals = (home_goals + away_goals) / n as f64;
    // +0.5 keeps the ratio finite for tiny samples.
    let home_adv = ((home_goals + 0.5) / (away_goals + 0.5)).ln();

    let w = (n as f64 / MIN_N).clamp(0.0, 1.0);
    let out = LeaguePrior {
        mean_goals: (1.0 - w) * base.mean_goals + w * mean_goals,
        home_advantage: ((1.0 - w) * base.home_advantage + w * home_adv).clamp(-0.60, 0.60),
        ..base
    };
    (out, n)
}
