use crate::calibration::Prob3;
use crate::league_params::LeaguePrior;
use crate::markets::{MarketProbs, OU_LINES};
use crate::team_strength::Strength;

pub const DEFAULT_MAX_GOALS: u32 = 10;

/// Expected goals for each side of a fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub home: f64,
    pub away: f64,
}

impl Rates {
    pub fn is_finite(&self) -> bool {
        self.home.is_finite() && self.away.is_finite()
    }
}

/// Log-linear rates around the league's per-side goal average.
///
/// Callers must drop the fixture when the result is not finite.
pub fn build_rates(home: Strength, away: Strength, prior: &LeaguePrior) -> Rates {
    let base = (prior.mean_goals / 2.0).ln();
    let log_home = base + home.attack - away.defense + prior.home_advantage;
    let log_away = base + away.attack - home.defense;

    // NaN must survive the floor so the caller can skip the fixture.
    let floor = |rate: f64| {
        if rate.is_nan() {
            rate
        } else {
            rate.max(prior.floor_rate)
        }
    };
    Rates {
        home: floor(log_home.exp()),
        away: floor(log_away.exp()),
    }
}

/// Poisson mass for 0..=max_k goals. The recurrence avoids factorials entirely.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let lambda = lambda.max(0.0);
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

/// Home/draw/away probabilities for independent Poisson scores, renormalized to cover
/// the mass lost to truncation at `max_goals`.
pub fn outcome_probs(lambda_home: f64, lambda_away: f64, max_goals: u32) -> Prob3 {
    let pmf_h = poisson_pmf(lambda_home, max_goals);
    let pmf_a = poisson_pmf(lambda_away, max_goals);

    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (i, p_i) in pmf_h.iter().enumerate() {
        for (j, p_j) in pmf_a.iter().enumerate() {
            let p = p_i * p_j;
            if i > j {
                p_home += p;
            } else if i < j {
                p_away += p;
            } else {
                p_draw += p;
            }
        }
    }

    Prob3::new(p_home, p_draw, p_away).normalized()
}

/// Joint scoreline distribution, normalized to total mass 1 over the truncated grid.
#[derive(Debug, Clone)]
pub struct ScoreGrid {
    max_goals: usize,
    cells: Vec<f64>,
}

impl ScoreGrid {
    pub fn new(lambda_home: f64, lambda_away: f64, max_goals: u32) -> Self {
        let pmf_h = poisson_pmf(lambda_home, max_goals);
        let pmf_a = poisson_pmf(lambda_away, max_goals);
        let n = max_goals as usize + 1;

        let mut cells = Vec::with_capacity(n * n);
        for p_i in &pmf_h {
            for p_j in &pmf_a {
                cells.push(p_i * p_j);
            }
        }
        let total: f64 = cells.iter().sum();
        if total > 0.0 {
            for c in &mut cells {
                *c /= total;
            }
        }
        Self {
            max_goals: max_goals as usize,
            cells,
        }
    }

    pub fn prob(&self, home_goals: usize, away_goals: usize) -> f64 {
        if home_goals > self.max_goals || away_goals > self.max_goals {
            return 0.0;
        }
        self.cells[home_goals * (self.max_goals + 1) + away_goals]
    }

    fn mass_where(&self, pred: impl Fn(usize, usize) -> bool) -> f64 {
        let n = self.max_goals + 1;
        self.cells
            .iter()
            .enumerate()
            .filter(|(idx, _)| pred(idx / n, idx % n))
            .map(|(_, p)| p)
            .sum()
    }

    pub fn one_x_two(&self) -> Prob3 {
        Prob3::new(
            self.mass_where(|h, a| h > a),
            self.mass_where(|h, a| h == a),
            self.mass_where(|h, a| h < a),
        )
    }

    pub fn both_teams_score(&self) -> f64 {
        self.mass_where(|h, a| h > 0 && a > 0)
    }

    pub fn over(&self, line: f64) -> f64 {
        self.mass_where(|h, a| (h + a) as f64 > line)
    }

    /// Every supported market priced off this grid.
    pub fn markets(&self) -> Vec<MarketProbs> {
        let p = self.one_x_two();
        let btts = self.both_teams_score();
        let mut out = vec![
            MarketProbs::OneXTwo {
                home: p.home,
                draw: p.draw,
                away: p.away,
            },
            MarketProbs::DoubleChance {
                home_or_draw: p.home + p.draw,
                home_or_away: p.home + p.away,
                draw_or_away: p.draw + p.away,
            },
            MarketProbs::BothTeamsScore {
                yes: btts,
                no: 1.0 - btts,
            },
        ];
        for line in OU_LINES {
            let over = self.over(line.value());
            out.push(MarketProbs::OverUnder {
                line,
                over,
                under: 1.0 - over,
            });
        }
        out
    }
}
