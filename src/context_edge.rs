use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backtest::{self, SkipCounts, SkipReason};
use crate::calibration::{Outcome, Prob3, logit, safe_prob};
use crate::config::EngineConfig;
use crate::historical_dataset::MatchRecord;
use crate::league_params::LeaguePriors;
use crate::odds;

const CONGESTION_SHORT_DAYS: i64 = 7;
const CONGESTION_LONG_DAYS: i64 = 14;

/// Situational signal that gates when an edge is acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSignal {
    Rest,
    Congestion,
}

impl ContextSignal {
    pub fn label(self) -> &'static str {
        match self {
            ContextSignal::Rest => "rest",
            ContextSignal::Congestion => "congestion",
        }
    }

    /// Signed home-advantage bucket in [-2, 2] for `fixture`, computed from `train` only.
    pub fn home_advantage(
        self,
        train: &[MatchRecord],
        fixture: &MatchRecord,
    ) -> Result<i8, SkipReason> {
        match self {
            ContextSignal::Rest => {
                let (home, away) = rest_days(train, fixture).ok_or(SkipReason::UndefinedContext)?;
                Ok(rest_bucket(home - away))
            }
            ContextSignal::Congestion => {
                let home = congestion_score(train, &fixture.home, fixture.date);
                let away = congestion_score(train, &fixture.away, fixture.date);
                let (Some(home), Some(away)) = (home, away) else {
                    return Err(SkipReason::UndefinedContext);
                };
                // The busier side is the disadvantaged one.
                match congestion_bucket(away - home) {
                    0 => Err(SkipReason::UndefinedContext),
                    bucket => Ok(bucket),
                }
            }
        }
    }
}

impl fmt::Display for ContextSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Days since each side's most recent match in `train`, as (home, away).
pub fn rest_days(train: &[MatchRecord], fixture: &MatchRecord) -> Option<(i64, i64)> {
    let mut last_home: Option<NaiveDate> = None;
    let mut last_away: Option<NaiveDate> = None;
    for m in train.iter().rev() {
        if last_home.is_none() && m.involves(&fixture.home) {
            last_home = Some(m.date);
        }
        if last_away.is_none() && m.involves(&fixture.away) {
            last_away = Some(m.date);
        }
        if last_home.is_some() && last_away.is_some() {
            break;
        }
    }
    let home = (fixture.date - last_home?).num_days();
    let away = (fixture.date - last_away?).num_days();
    Some((home, away))
}

pub fn rest_bucket(delta: i64) -> i8 {
    match delta {
        d if d >= 3 => 2,
        2 => 1,
        d if d <= -3 => -2,
        -2 => -1,
        _ => 0,
    }
}

/// Matches in the trailing 7 days plus half the matches in the trailing 14 days.
/// `None` when the team has not played within 14 days.
pub fn congestion_score(train: &[MatchRecord], team: &str, as_of: NaiveDate) -> Option<f64> {
    let mut short = 0u32;
    let mut long = 0u32;
    for m in train.iter().rev() {
        if !m.involves(team) {
            continue;
        }
        let days = (as_of - m.date).num_days();
        if days < 0 || days > CONGESTION_LONG_DAYS {
            break;
        }
        if days <= CONGESTION_SHORT_DAYS {
            short += 1;
        }
        long += 1;
    }
    (long > 0).then(|| short as f64 + 0.5 * long as f64)
}

pub fn congestion_bucket(delta: f64) -> i8 {
    if delta >= 2.0 {
        2
    } else if delta >= 1.0 {
        1
    } else if delta <= -2.0 {
        -2
    } else if delta <= -1.0 {
        -1
    } else {
        0
    }
}

/// Logit-space gap between the model and the market for one outcome.
pub fn edge(model: f64, market: f64) -> f64 {
    logit(safe_prob(model)) - logit(safe_prob(market))
}

/// Prices below this are never backed, whatever the side's band says.
pub const MIN_BACKED_PRICE: f64 = 1.45;

/// Inclusive decimal price window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsBand {
    pub min: f64,
    pub max: f64,
}

impl OddsBand {
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Per-side price windows a pick must fall in before it is backed. A side without a
/// band is never backed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsBands {
    pub home: Option<OddsBand>,
    pub draw: Option<OddsBand>,
    pub away: Option<OddsBand>,
}

impl OddsBands {
    /// Medium home prices, mid-range draws and away underdogs.
    pub fn tuned() -> Self {
        Self {
            home: Some(OddsBand { min: 1.9, max: 2.8 }),
            draw: Some(OddsBand { min: 3.4, max: 4.2 }),
            away: Some(OddsBand { min: 3.2, max: 6.5 }),
        }
    }

    pub fn allows(&self, side: Outcome, price: f64) -> bool {
        if !price.is_finite() || price < MIN_BACKED_PRICE {
            return false;
        }
        let band = match side {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        };
        band.is_some_and(|b| b.contains(price))
    }
}

/// Fractional Kelly stake, as a share of bankroll, for backing probability `p` at
/// decimal `odds`. Never negative and never above `cap`.
pub fn kelly_stake(p: f64, odds: f64, fraction: f64, cap: f64) -> f64 {
    let b = odds - 1.0;
    if b.is_nan() || b <= 0.0 || !p.is_finite() {
        return 0.0;
    }
    let full = (b * p - (1.0 - p)) / b;
    (full * fraction).max(0.0).min(cap.max(0.0))
}

/// Flat-stake betting tally for one threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdStats {
    pub bets: usize,
    pub wins: usize,
    pub profit: f64,
    pub odds_sum: f64,
}

impl ThresholdStats {
    /// Settles a unit stake at decimal `odds`; returns the net result.
    pub fn settle(&mut self, odds: f64, won: bool) -> f64 {
        self.bets += 1;
        self.odds_sum += odds;
        let net = if won {
            self.wins += 1;
            odds - 1.0
        } else {
            -1.0
        };
        self.profit += net;
        net
    }

    pub fn hit_rate(&self) -> Option<f64> {
        (self.bets > 0).then(|| self.wins as f64 / self.bets as f64)
    }

    pub fn avg_odds(&self) -> Option<f64> {
        (self.bets > 0).then(|| self.odds_sum / self.bets as f64)
    }

    pub fn roi(&self) -> Option<f64> {
        (self.bets > 0).then(|| self.profit / self.bets as f64)
    }
}

/// Kelly-staked results for the same bets a [`ThresholdStats`] settles at a flat unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KellyStats {
    pub staked: f64,
    pub profit: f64,
}

impl KellyStats {
    pub fn settle(&mut self, stake: f64, odds: f64, won: bool) -> f64 {
        self.staked += stake;
        let net = if won { stake * (odds - 1.0) } else { -stake };
        self.profit += net;
        net
    }

    /// Profit per unit staked; `None` until something has been staked.
    pub fn roi(&self) -> Option<f64> {
        (self.staked > 0.0).then(|| self.profit / self.staked)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LeagueBets {
    pub bets: usize,
    pub profit: f64,
}

impl LeagueBets {
    pub fn roi(&self) -> f64 {
        if self.bets == 0 {
            0.0
        } else {
            self.profit / self.bets as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdSummary {
    pub threshold: f64,
    pub bets: usize,
    pub wins: usize,
    pub profit: f64,
    pub hit_rate: Option<f64>,
    pub avg_odds: Option<f64>,
    pub roi: Option<f64>,
    pub kelly: KellyStats,
    pub kelly_roi: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub leagues: BTreeMap<String, LeagueBets>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// `rest`, `congestion` or `max_edge`.
    pub variant: String,
    pub matches: usize,
    pub evaluated: usize,
    pub skipped: SkipCounts,
    /// Evaluated fixtures whose pick fell outside the configured odds bands.
    pub out_of_band: usize,
    pub thresholds: Vec<ThresholdSummary>,
}

struct SweepTally {
    thresholds: Vec<f64>,
    stats: Vec<ThresholdStats>,
    kelly: Vec<KellyStats>,
    leagues: Vec<BTreeMap<String, LeagueBets>>,
}

impl SweepTally {
    fn new(thresholds: &[f64]) -> Self {
        Self {
            thresholds: thresholds.to_vec(),
            stats: vec![ThresholdStats::default(); thresholds.len()],
            kelly: vec![KellyStats::default(); thresholds.len()],
            leagues: vec![BTreeMap::new(); thresholds.len()],
        }
    }

    /// Settles the flat and the Kelly stake at threshold `k`; returns the flat net.
    fn settle(&mut self, k: usize, odds: f64, won: bool, kelly_stake: f64) -> f64 {
        self.kelly[k].settle(kelly_stake, odds, won);
        self.stats[k].settle(odds, won)
    }

    fn finish(self, min_league_bets: usize) -> Vec<ThresholdSummary> {
        self.thresholds
            .into_iter()
            .zip(self.stats)
            .zip(self.kelly)
            .zip(self.leagues)
            .map(|(((threshold, s), kelly), leagues)| ThresholdSummary {
                threshold,
                bets: s.bets,
                wins: s.wins,
                profit: s.profit,
                hit_rate: s.hit_rate(),
                avg_odds: s.avg_odds(),
                roi: s.roi(),
                kelly,
                kelly_roi: kelly.roi(),
                leagues: leagues
                    .into_iter()
                    .filter(|(_, l)| l.bets >= min_league_bets)
                    .collect(),
            })
            .collect()
    }
}

/// Picks the side to back at one threshold given a home-advantage bucket, or `None`.
pub fn context_pick(
    advantage: i8,
    edge_home: f64,
    edge_away: f64,
    threshold: f64,
    min_context: i8,
) -> Option<Outcome> {
    if advantage >= min_context && edge_home >= threshold {
        Some(Outcome::Home)
    } else if advantage <= -min_context && edge_away >= threshold {
        Some(Outcome::Away)
    } else {
        None
    }
}

/// Outcome with the largest edge; ties keep the earlier of home, draw, away.
pub fn max_edge_pick(model: Prob3, market: Prob3) -> (Outcome, f64) {
    let mut best = (Outcome::Home, edge(model.home, market.home));
    for outcome in [Outcome::Draw, Outcome::Away] {
        let e = edge(model.get(outcome), market.get(outcome));
        if e > best.1 {
            best = (outcome, e);
        }
    }
    best
}

/// Threshold sweep over the expanding window, betting only where `signal` favours a side.
/// Only home and away are ever backed.
pub fn run_context_sweep(
    matches: &[MatchRecord],
    signal: ContextSignal,
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> SweepReport {
    let mut tally = SweepTally::new(&cfg.thresholds);
    let mut skipped = SkipCounts::default();
    let mut evaluated = 0usize;

    info!(signal = signal.label(), matches = matches.len(), "context sweep started");

    backtest::for_each_step(matches, cfg, signal.label(), |_, train, test| {
        let Some(market) = odds::implied_from(&test.odds) else {
            skipped.record(SkipReason::MissingOdds);
            return;
        };
        let advantage = match signal.home_advantage(train, test) {
            Ok(a) => a,
            Err(reason) => {
                skipped.record(reason);
                return;
            }
        };
        let pred = match backtest::predict_fixture(train, test, priors, cfg) {
            Ok(p) => p,
            Err(reason) => {
                skipped.record(reason);
                return;
            }
        };
        evaluated += 1;

        let edge_home = edge(pred.calibrated.home, market.home);
        let edge_away = edge(pred.calibrated.away, market.away);
        let outcome = test.outcome();

        for k in 0..tally.thresholds.len() {
            let threshold = tally.thresholds[k];
            let Some(pick) = context_pick(advantage, edge_home, edge_away, threshold, cfg.min_context)
            else {
                continue;
            };
            let Some(price) = test.odds.price(pick) else {
                continue;
            };
            let stake = kelly_stake(
                pred.calibrated.get(pick),
                price,
                cfg.kelly_fraction,
                cfg.kelly_cap,
            );
            tally.settle(k, price, pick == outcome, stake);
        }
    });

    debug!(?skipped, "context sweep skips");
    SweepReport {
        variant: signal.label().to_string(),
        matches: matches.len(),
        evaluated,
        skipped,
        out_of_band: 0,
        thresholds: tally.finish(usize::MAX),
    }
}

/// Unconditional sweep: one bet per fixture on the max-edge outcome when it clears the
/// threshold, with a per-league breakdown. With `odds_bands` configured, picks priced
/// outside their side's band are counted in `out_of_band` and not backed.
pub fn run_edge_sweep(
    matches: &[MatchRecord],
    priors: &LeaguePriors,
    cfg: &EngineConfig,
) -> SweepReport {
    let mut tally = SweepTally::new(&cfg.thresholds);
    let mut skipped = SkipCounts::default();
    let mut evaluated = 0usize;
    let mut out_of_band = 0usize;

    info!(
        matches = matches.len(),
        bands = cfg.odds_bands.is_some(),
        "max-edge sweep started"
    );

    backtest::for_each_step(matches, cfg, "max_edge", |_, train, test| {
        let Some(market) = odds::implied_from(&test.odds) else {
            skipped.record(SkipReason::MissingOdds);
            return;
        };
        let pred = match backtest::predict_fixture(train, test, priors, cfg) {
            Ok(p) => p,
            Err(reason) => {
                skipped.record(reason);
                return;
            }
        };
        evaluated += 1;

        let (pick, best) = max_edge_pick(pred.calibrated, market);
        let Some(price) = test.odds.price(pick) else {
            return;
        };
        if cfg.odds_bands.is_some_and(|bands| !bands.allows(pick, price)) {
            out_of_band += 1;
            return;
        }
        let won = pick == test.outcome();
        let stake = kelly_stake(
            pred.calibrated.get(pick),
            price,
            cfg.kelly_fraction,
            cfg.kelly_cap,
        );

        for k in 0..tally.thresholds.len() {
            if best < tally.thresholds[k] {
                continue;
            }
            let net = tally.settle(k, price, won, stake);
            let league = tally.leagues[k].entry(test.league.clone()).or_default();
            league.bets += 1;
            league.profit += net;
        }
    });

    debug!(?skipped, out_of_band, "max-edge sweep skips");
    SweepReport {
        variant: "max_edge".to_string(),
        matches: matches.len(),
        evaluated,
        skipped,
        out_of_band,
        thresholds: tally.finish(cfg.min_league_bets),
    }
}
