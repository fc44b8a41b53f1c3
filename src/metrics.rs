use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::calibration::{Outcome, Prob3, one_hot, safe_prob};

pub const DEFAULT_CALIBRATION_BINS: usize = 10;
pub const DEFAULT_MIN_LEAGUE_SAMPLES: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
struct BinAcc {
    count: usize,
    prob_sum: f64,
    outcome_sum: f64,
}

/// Fixed-width reliability histogram over [0, 1) for one outcome class.
#[derive(Debug, Clone)]
struct Histogram {
    bins: Vec<BinAcc>,
}

impl Histogram {
    fn new(bins: usize) -> Self {
        Self {
            bins: vec![BinAcc::default(); bins.max(2)],
        }
    }

    fn index(&self, p: f64) -> usize {
        let n = self.bins.len();
        if !p.is_finite() {
            return 0;
        }
        ((p * n as f64).floor().max(0.0) as usize).min(n - 1)
    }

    fn add(&mut self, p: f64, hit: bool) {
        let idx = self.index(p);
        let bin = &mut self.bins[idx];
        bin.count += 1;
        bin.prob_sum += p;
        if hit {
            bin.outcome_sum += 1.0;
        }
    }

    fn finalize(&self) -> Vec<CalibrationBin> {
        let n = self.bins.len() as f64;
        self.bins
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let (avg_pred, actual_rate) = if b.count > 0 {
                    (b.prob_sum / b.count as f64, b.outcome_sum / b.count as f64)
                } else {
                    (0.0, 0.0)
                };
                CalibrationBin {
                    bucket_start: i as f64 / n,
                    bucket_end: (i + 1) as f64 / n,
                    count: b.count,
                    avg_pred,
                    actual_rate,
                }
            })
            .collect()
    }
}

/// Running sums for one scope (global or a single league).
#[derive(Debug, Clone)]
pub struct MetricsBucket {
    samples: usize,
    brier_sum: f64,
    log_loss_sum: f64,
    home: Histogram,
    draw: Histogram,
    away: Histogram,
}

impl MetricsBucket {
    fn new(bins: usize) -> Self {
        Self {
            samples: 0,
            brier_sum: 0.0,
            log_loss_sum: 0.0,
            home: Histogram::new(bins),
            draw: Histogram::new(bins),
            away: Histogram::new(bins),
        }
    }

    fn accumulate(&mut self, p: Prob3, outcome: Outcome, brier: f64, log_loss: f64) {
        self.samples += 1;
        self.brier_sum += brier;
        self.log_loss_sum += log_loss;
        self.home.add(p.home, outcome == Outcome::Home);
        self.draw.add(p.draw, outcome == Outcome::Draw);
        self.away.add(p.away, outcome == Outcome::Away);
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    fn finalize(&self) -> BucketReport {
        let calibration = CalibrationReport {
            home: self.home.finalize(),
            draw: self.draw.finalize(),
            away: self.away.finalize(),
        };
        if self.samples == 0 {
            return BucketReport {
                samples: 0,
                brier: None,
                logloss: None,
                ece: None,
                calibration,
            };
        }
        let n = self.samples as f64;
        let ece = expected_calibration_error(&calibration, self.samples);
        BucketReport {
            samples: self.samples,
            brier: Some(self.brier_sum / n),
            logloss: Some(self.log_loss_sum / n),
            ece: Some(ece),
            calibration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub home: Vec<CalibrationBin>,
    pub draw: Vec<CalibrationBin>,
    pub away: Vec<CalibrationBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub samples: usize,
    pub brier: Option<f64>,
    pub logloss: Option<f64>,
    pub ece: Option<f64>,
    pub calibration: CalibrationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub global: BucketReport,
    pub leagues: BTreeMap<String, BucketReport>,
}

/// Three-way Brier score: squared distance from the one-hot outcome.
pub fn brier_score(p: Prob3, outcome: Outcome) -> f64 {
    let y = one_hot(outcome);
    (p.home - y.home).powi(2) + (p.draw - y.draw).powi(2) + (p.away - y.away).powi(2)
}

pub fn log_loss(p: Prob3, outcome: Outcome) -> f64 {
    -safe_prob(p.get(outcome)).ln()
}

/// Count-weighted gap between predicted and observed frequency, averaged over classes.
pub fn expected_calibration_error(cal: &CalibrationReport, samples: usize) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    let n = samples as f64;
    let mut sum = 0.0;
    for bins in [&cal.home, &cal.draw, &cal.away] {
        for b in bins.iter().filter(|b| b.count > 0) {
            sum += (b.count as f64 / n) * (b.avg_pred - b.actual_rate).abs();
        }
    }
    sum / 3.0
}

/// Brier, log-loss and reliability curves, globally and per league.
///
/// League buckets are always accumulated but only reported once they hold at least
/// `min_league_samples` samples.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    bins: usize,
    min_league_samples: usize,
    global: MetricsBucket,
    leagues: HashMap<String, MetricsBucket>,
}

impl Default for MetricsAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_BINS, DEFAULT_MIN_LEAGUE_SAMPLES)
    }
}

impl MetricsAccumulator {
    pub fn new(bins: usize, min_league_samples: usize) -> Self {
        Self {
            bins,
            min_league_samples,
            global: MetricsBucket::new(bins),
            leagues: HashMap::new(),
        }
    }

    pub fn add_sample(
        &mut self,
        league: &str,
        p_home: f64,
        p_draw: f64,
        p_away: f64,
        outcome: Outcome,
    ) {
        let p = Prob3::new(p_home, p_draw, p_away).clamped();
        let brier = brier_score(p, outcome);
        let ll = log_loss(p, outcome);

        self.global.accumulate(p, outcome, brier, ll);
        let bins = self.bins;
        self.leagues
            .entry(league.to_string())
            .or_insert_with(|| MetricsBucket::new(bins))
            .accumulate(p, outcome, brier, ll);
    }

    pub fn add_prob(&mut self, league: &str, p: Prob3, outcome: Outcome) {
        self.add_sample(league, p.home, p.draw, p.away, outcome);
    }

    pub fn samples(&self) -> usize {
        self.global.samples
    }

    pub fn league_samples(&self, league: &str) -> usize {
        self.leagues.get(league).map_or(0, |b| b.samples)
    }

    pub fn finalize(&self) -> MetricsReport {
        let leagues = self
            .leagues
            .iter()
            .filter(|(_, b)| b.samples >= self.min_league_samples)
            .map(|(id, b)| (id.clone(), b.finalize()))
            .collect();
        MetricsReport {
            global: self.global.finalize(),
            leagues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_brier_and_log_loss() {
        let p = Prob3::new(0.6, 0.2, 0.2);
        assert!((brier_score(p, Outcome::Home) - 0.24).abs() < 1e-12);
        assert!((log_loss(p, Outcome::Home) - 0.5108).abs() < 1e-4);
    }

    #[test]
    fn perfect_predictions_have_zero_brier() {
        let mut acc = MetricsAccumulator::default();
        acc.add_sample("L", 1.0, 0.0, 0.0, Outcome::Home);
        acc.add_sample("L", 0.0, 1.0, 0.0, Outcome::Draw);
        acc.add_sample("L", 0.0, 0.0, 1.0, Outcome::Away);
        let report = acc.finalize();
        assert_eq!(report.global.samples, 3);
        assert!(report.global.brier.unwrap() < 1e-12);
        assert!(report.global.logloss.unwrap() < 1e-12);
    }

    #[test]
    fn empty_accumulator_reports_nulls() {
        let report = MetricsAccumulator::default().finalize();
        assert_eq!(report.global.samples, 0);
        assert!(report.global.brier.is_none());
        assert!(report.global.logloss.is_none());
        assert!(report.leagues.is_empty());
        assert_eq!(report.global.calibration.home.len(), DEFAULT_CALIBRATION_BINS);
    }

    #[test]
    fn histogram_bins_by_predicted_probability() {
        let mut acc = MetricsAccumulator::default();
        acc.add_sample("L", 0.55, 0.25, 0.20, Outcome::Home);
        acc.add_sample("L", 0.58, 0.22, 0.20, Outcome::Away);
        acc.add_sample("L", 1.0, 0.0, 0.0, Outcome::Home);
        let report = acc.finalize();
        let home = &report.global.calibration.home;
        assert_eq!(home[5].count, 2);
        assert!((home[5].avg_pred - 0.565).abs() < 1e-12);
        assert!((home[5].actual_rate - 0.5).abs() < 1e-12);
        // p = 1 lands in the last bin, not past it.
        assert_eq!(home[9].count, 1);
        assert_eq!(report.global.calibration.draw[2].count, 2);
    }

    #[test]
    fn league_gate_opens_at_threshold() {
        let mut acc = MetricsAccumulator::default();
        for _ in 0..499 {
            acc.add_sample("ENG1", 0.45, 0.28, 0.27, Outcome::Draw);
        }
        acc.add_sample("GER1", 0.45, 0.28, 0.27, Outcome::Home);
        let report = acc.finalize();
        assert!(!report.leagues.contains_key("ENG1"));
        assert_eq!(report.global.samples, 500);
        assert_eq!(acc.league_samples("ENG1"), 499);

        acc.add_sample("ENG1", 0.45, 0.28, 0.27, Outcome::Away);
        let report = acc.finalize();
        assert_eq!(report.leagues["ENG1"].samples, 500);
        assert!(!report.leagues.contains_key("GER1"));
    }

    #[test]
    fn well_calibrated_constant_forecast_has_small_ece() {
        let mut acc = MetricsAccumulator::default();
        for i in 0..100 {
            let outcome = match i % 4 {
                0 | 1 => Outcome::Home,
                2 => Outcome::Draw,
                _ => Outcome::Away,
            };
            acc.add_sample("L", 0.5, 0.25, 0.25, outcome);
        }
        let ece = acc.finalize().global.ece.unwrap();
        assert!(ece < 1e-9);
    }
}
