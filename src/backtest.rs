use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::calibration::{self, Prob3};
use crate::config::EngineConfig;
use crate::historical_dataset::{self, MatchRecord};
use crate::league_params::LeaguePriors;
use crate::markets::MarketProbs;
use crate::metrics::{MetricsAccumulator, MetricsReport};
use crate::odds;
use crate::team_strength::TeamStates;
use crate::win_prob::{self, Rates, ScoreGrid};

/// Why a held-out fixture produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// One side has not appeared in the training slice yet.
    ColdStart,
    NonFiniteRate,
    MissingOdds,
    UndefinedContext,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounts {
    pub cold_start: usize,
    pub non_finite_rate: usize,
    pub missing_odds: usize,
    pub undefined_context: usize,
}

impl SkipCounts {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::ColdStart => self.cold_start += 1,
            SkipReason::NonFiniteRate => self.non_finite_rate += 1,
            SkipReason::MissingOdds => self.missing_odds += 1,
            SkipReason::UndefinedContext => self.undefined_context += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.cold_start + self.non_finite_rate + self.missing_odds + self.undefined_context
    }
}

/// Model output for one fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub rates: Rates,
    pub raw: Prob3,
    /// Blended toward uniform and clamped away from 0 and 1.
    pub calibrated: Prob3,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRow {
    pub index: usize,
    pub league: String,
    pub date: NaiveDate,
    pub home: String,
    pub away: String,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub calibrated: Prob3,
    pub markets: Vec<MarketProbs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub matches: usize,
    pub warmup: usize,
    pub evaluated: usize,
    pub skipped: SkipCounts,
    pub model: MetricsReport,
    pub raw: MetricsReport,
    /// De-vigged bookmaker probabilities scored on the fixtures that carried a quote.
    pub market: Option<MetricsReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predictions: Vec<PredictionRow>,
}

/// Predicts `fixture` from team states rebuilt over `train` alone.
pub fn predict_fixture(
    train: &[MatchRecord],
    fixture: &MatchRecord,
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> Result<Prediction, SkipReason> {
    let teams = TeamStates::from_matches(train);
    predict_with_states(&teams, fixture, priors, cfg)
}

pub fn predict_with_states(
    teams: &TeamStates,
    fixture: &MatchRecord,
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> Result<Prediction, SkipReason> {
    let (Some(home), Some(away)) = (
        teams.strength(&fixture.home, cfg.shrink_k),
        teams.strength(&fixture.away, cfg.shrink_k),
    ) else {
        return Err(SkipReason::ColdStart);
    };

    let prior = priors.get_prior(&fixture.league);
    let rates = win_prob::build_rates(home, away, prior);
    if !rates.is_finite() {
        return Err(SkipReason::NonFiniteRate);
    }

    let raw = win_prob::outcome_probs(rates.home, rates.away, cfg.max_goals);
    let calibrated = calibration::calibrate(raw, cfg.alpha).clamped();
    Ok(Prediction {
        rates,
        raw,
        calibrated,
    })
}

/// Walks the expanding window: after `warmup` fixtures, calls `step` with the full
/// history strictly before each held-out fixture.
pub fn for_each_step<'a>(
    matches: &'a [MatchRecord],
    cfg: &EngineConfig,
    label: &str,
    mut step: impl FnMut(usize, &'a [MatchRecord], &'a MatchRecord),
) {
    let total = matches.len();
    let every = cfg.progress_every.max(1);
    for i in cfg.warmup..total {
        if i % every == 0 {
            info!(run = label, "rolling progress: {i} / {total}");
        }
        step(i, &matches[..i], &matches[i]);
    }
}

pub fn run_backtest(
    matches: &[MatchRecord],
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> BacktestReport {
    let mut model = MetricsAccumulator::new(cfg.calibration_bins, cfg.min_league_samples);
    let mut raw = MetricsAccumulator::new(cfg.calibration_bins, cfg.min_league_samples);
    let mut market = MetricsAccumulator::new(cfg.calibration_bins, cfg.min_league_samples);
    let mut skipped = SkipCounts::default();
    let mut predictions = Vec::new();
    let mut evaluated = 0usize;

    info!(
        matches = matches.len(),
        warmup = cfg.warmup,
        alpha = cfg.alpha,
        require_odds = cfg.require_odds,
        "rolling backtest started"
    );

    for_each_step(matches, cfg, "backtest", |i, train, test| {
        let implied = odds::implied_from(&test.odds);
        if cfg.require_odds && implied.is_none() {
            skipped.record(SkipReason::MissingOdds);
            return;
        }

        let pred = match predict_fixture(train, test, priors, cfg) {
            Ok(p) => p,
            Err(reason) => {
                skipped.record(reason);
                return;
            }
        };

        let outcome = test.outcome();
        model.add_prob(&test.league, pred.calibrated, outcome);
        raw.add_prob(&test.league, pred.raw, outcome);
        if let Some(mkt) = implied {
            market.add_prob(&test.league, mkt, outcome);
        }
        evaluated += 1;

        if cfg.collect_predictions {
            let grid = ScoreGrid::new(pred.rates.home, pred.rates.away, cfg.max_goals);
            predictions.push(PredictionRow {
                index: i,
                league: test.league.clone(),
                date: test.date,
                home: test.home.clone(),
                away: test.away.clone(),
                lambda_home: pred.rates.home,
                lambda_away: pred.rates.away,
                calibrated: pred.calibrated,
                markets: grid.markets(),
            });
        }
    });

    info!(
        evaluated,
        skipped = skipped.total(),
        "rolling backtest finished"
    );
    debug!(?skipped, "skip breakdown");

    BacktestReport {
        matches: matches.len(),
        warmup: cfg.warmup.min(matches.len()),
        evaluated,
        skipped,
        model: model.finalize(),
        raw: raw.finalize(),
        market: (market.samples() > 0).then(|| market.finalize()),
        predictions,
    }
}

/// One independent backtest per league, run in parallel. Each run owns its own team
/// states and accumulators; results come back in league-id order.
pub fn run_backtest_by_league(
    matches: &[MatchRecord],
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> Vec<(String, BacktestReport)> {
    let mut leagues = historical_dataset::league_ids(matches);
    leagues.sort();
    leagues
        .into_par_iter()
        .map(|league| {
            let rows = historical_dataset::filter_league(matches, &league);
            let report = run_backtest(&rows, priors, cfg);
            (league, report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical_dataset::MarketOdds;
    use crate::league_params::LeaguePrior;

    fn rec(day: u32, home: &str, away: &str, hg: u8, ag: u8) -> MatchRecord {
        MatchRecord {
            league: "ENG1".to_string(),
            season: "2324".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 8, 1).unwrap() + chrono::Days::new(day as u64),
            home: home.to_string(),
            away: away.to_string(),
            home_goals: hg,
            away_goals: ag,
            odds: MarketOdds::new(2.2, 3.3, 3.4),
        }
    }

    #[test]
    fn unseen_team_is_cold_start() {
        let train = vec![rec(0, "A", "B", 1, 0)];
        let err = predict_fixture(
            &train,
            &rec(1, "A", "C", 0, 0),
            &LeaguePriors::default(),
            &EngineConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err, SkipReason::ColdStart);
    }

    #[test]
    fn prediction_is_calibrated_and_clamped() {
        let train = vec![rec(0, "A", "B", 3, 0), rec(3, "B", "A", 0, 2)];
        let cfg = EngineConfig::default();
        let pred =
            predict_fixture(&train, &rec(7, "A", "B", 1, 1), &LeaguePriors::default(), &cfg)
                .unwrap();
        assert!((pred.raw.sum() - 1.0).abs() < 1e-9);
        assert!((pred.calibrated.sum() - 1.0).abs() < 1e-9);
        assert!(pred.raw.home > pred.raw.away);
        // Blending pulls every class toward 1/3.
        assert!(pred.calibrated.home < pred.raw.home);
        assert!(pred.calibrated.away > pred.raw.away);
    }

    #[test]
    fn warmup_fixtures_are_never_evaluated() {
        let matches: Vec<_> = (0..12)
            .map(|d| rec(d, if d % 2 == 0 { "A" } else { "B" }, if d % 2 == 0 { "B" } else { "A" }, 1, 0))
            .collect();
        let report = run_backtest(&matches, &LeaguePriors::default(), &EngineConfig::default());
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.model.global.samples, 2);
        assert_eq!(report.market.as_ref().map(|m| m.global.samples), Some(2));
    }

    #[test]
    fn require_odds_skips_unquoted_fixtures() {
        let mut matches: Vec<_> = (0..14).map(|d| rec(d, "A", "B", 2, 1)).collect();
        matches[12].odds = MarketOdds::default();
        let cfg = EngineConfig {
            require_odds: true,
            collect_predictions: true,
            ..EngineConfig::default()
        };
        let report = run_backtest(&matches, &LeaguePriors::default(), &cfg);
        assert_eq!(report.skipped.missing_odds, 1);
        assert_eq!(report.evaluated, 3);
        assert_eq!(report.predictions.len(), 3);
        assert_eq!(report.predictions[0].index, 10);
        assert_eq!(report.predictions[0].markets.len(), 6);
    }

    #[test]
    fn overflowing_rate_is_skipped_not_scored() {
        let mut matches: Vec<_> = (0..14)
            .map(|d| rec(d, if d % 2 == 0 { "A" } else { "B" }, if d % 2 == 0 { "B" } else { "A" }, 1, 1))
            .collect();
        matches[11].league = "XXX1".to_string();
        matches[13].league = "XXX1".to_string();

        let mut priors = LeaguePriors::default();
        priors.leagues.insert(
            "XXX1".to_string(),
            LeaguePrior {
                mean_goals: 1e308,
                home_advantage: 10.0,
                sigma_team: 0.35,
                floor_rate: 0.25,
            },
        );
        let report = run_backtest(&matches, &priors, &EngineConfig::default());
        assert_eq!(report.skipped.non_finite_rate, 2);
        assert_eq!(report.skipped.total(), 2);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.model.global.samples, 2);
        assert_eq!(report.raw.global.samples, 2);
        assert_eq!(report.market.as_ref().map(|m| m.global.samples), Some(2));
    }

    #[test]
    fn short_archive_yields_empty_report() {
        let matches: Vec<_> = (0..5).map(|d| rec(d, "A", "B", 0, 0)).collect();
        let report = run_backtest(&matches, &LeaguePriors::default(), &EngineConfig::default());
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.warmup, 5);
        assert!(report.market.is_none());
        assert!(report.model.global.brier.is_none());
    }
}
