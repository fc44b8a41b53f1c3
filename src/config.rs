use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::context_edge::OddsBands;
use crate::metrics::{DEFAULT_CALIBRATION_BINS, DEFAULT_MIN_LEAGUE_SAMPLES};
use crate::team_strength::DEFAULT_SHRINK_K;
use crate::win_prob::DEFAULT_MAX_GOALS;

pub const DEFAULT_ALPHA: f64 = 0.30;
pub const DEFAULT_WARMUP: usize = 10;
pub const DEFAULT_PROGRESS_EVERY: usize = 5000;
pub const DEFAULT_THRESHOLDS: [f64; 5] = [0.05, 0.10, 0.15, 0.20, 0.25];
pub const DEFAULT_MIN_CONTEXT: i8 = 1;
pub const DEFAULT_MIN_LEAGUE_BETS: usize = 50;
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;
pub const DEFAULT_KELLY_CAP: f64 = 0.05;

/// Tunables for one backtest run. Defaults are the locked reference values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Weight on the model when blending toward the uniform prior.
    pub alpha: f64,
    pub shrink_k: f64,
    pub max_goals: u32,
    pub warmup: usize,
    pub progress_every: usize,
    pub calibration_bins: usize,
    pub min_league_samples: usize,
    /// Skip fixtures without a valid 1X2 quote.
    pub require_odds: bool,
    pub collect_predictions: bool,
    pub thresholds: Vec<f64>,
    pub min_context: i8,
    pub min_league_bets: usize,
    /// Share of full Kelly staked alongside the flat unit.
    pub kelly_fraction: f64,
    /// Largest Kelly stake as a share of bankroll.
    pub kelly_cap: f64,
    /// Price windows for the max-edge sweep; `None` backs any price.
    pub odds_bands: Option<OddsBands>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            shrink_k: DEFAULT_SHRINK_K,
            max_goals: DEFAULT_MAX_GOALS,
            warmup: DEFAULT_WARMUP,
            progress_every: DEFAULT_PROGRESS_EVERY,
            calibration_bins: DEFAULT_CALIBRATION_BINS,
            min_league_samples: DEFAULT_MIN_LEAGUE_SAMPLES,
            require_odds: false,
            collect_predictions: false,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            min_context: DEFAULT_MIN_CONTEXT,
            min_league_bets: DEFAULT_MIN_LEAGUE_BETS,
            kelly_fraction: DEFAULT_KELLY_FRACTION,
            kelly_cap: DEFAULT_KELLY_CAP,
            odds_bands: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read engine config {}", path.display()))?;
        let cfg: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse engine config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    /// Defaults, then an optional JSON file, then `MATCHLAB_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<f64>("MATCHLAB_ALPHA") {
            self.alpha = v;
        }
        if let Some(v) = env_parse::<f64>("MATCHLAB_SHRINK_K") {
            self.shrink_k = v;
        }
        if let Some(v) = env_parse::<u32>("MATCHLAB_MAX_GOALS") {
            self.max_goals = v;
        }
        if let Some(v) = env_parse::<usize>("MATCHLAB_WARMUP") {
            self.warmup = v;
        }
        if let Some(v) = env_parse::<usize>("MATCHLAB_PROGRESS_EVERY") {
            self.progress_every = v;
        }
        if let Some(v) = env_parse::<usize>("MATCHLAB_MIN_LEAGUE_SAMPLES") {
            self.min_league_samples = v;
        }
        if let Some(v) = env_parse::<i8>("MATCHLAB_MIN_CONTEXT") {
            self.min_context = v;
        }
        if let Some(v) = env_parse::<f64>("MATCHLAB_KELLY_FRACTION") {
            self.kelly_fraction = v;
        }
        if let Some(v) = env_parse::<f64>("MATCHLAB_KELLY_CAP") {
            self.kelly_cap = v;
        }
        if let Ok(raw) = env::var("MATCHLAB_THRESHOLDS") {
            let parsed = parse_thresholds(&raw);
            if !parsed.is_empty() {
                self.thresholds = parsed;
            }
        }
        self.sanitized()
    }

    /// Clamps every knob into a range the engine can work with.
    pub fn sanitized(mut self) -> Self {
        self.alpha = if self.alpha.is_finite() {
            self.alpha.clamp(0.0, 1.0)
        } else {
            DEFAULT_ALPHA
        };
        self.shrink_k = if self.shrink_k.is_finite() {
            self.shrink_k.max(0.0)
        } else {
            DEFAULT_SHRINK_K
        };
        self.max_goals = self.max_goals.clamp(1, 30);
        self.progress_every = self.progress_every.max(1);
        self.calibration_bins = self.calibration_bins.clamp(2, 100);
        self.min_context = self.min_context.clamp(1, 2);
        self.kelly_fraction = if self.kelly_fraction.is_finite() {
            self.kelly_fraction.clamp(0.0, 1.0)
        } else {
            DEFAULT_KELLY_FRACTION
        };
        self.kelly_cap = if self.kelly_cap.is_finite() {
            self.kelly_cap.clamp(0.0, 1.0)
        } else {
            DEFAULT_KELLY_CAP
        };
        self.thresholds.retain(|t| t.is_finite());
        self.thresholds.sort_by(|a, b| a.total_cmp(b));
        self.thresholds.dedup();
        if self.thresholds.is_empty() {
            self.thresholds = DEFAULT_THRESHOLDS.to_vec();
        }
        self
    }
}

pub fn parse_thresholds(raw: &str) -> Vec<f64> {
    raw.split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
