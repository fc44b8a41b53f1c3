use serde::{Deserialize, Serialize};

pub const PROB_EPS: f64 = 1e-15;
pub const UNIFORM_3WAY: f64 = 1.0 / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "H")]
    Home,
    #[serde(rename = "D")]
    Draw,
    #[serde(rename = "A")]
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self { home, draw, away }
    }

    pub fn uniform() -> Self {
        Self {
            home: UNIFORM_3WAY,
            draw: UNIFORM_3WAY,
            away: UNIFORM_3WAY,
        }
    }

    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            home: f(self.home),
            draw: f(self.draw),
            away: f(self.away),
        }
    }

    /// Rescales the triple to sum to one. Degenerate input falls back to uniform.
    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Self::uniform();
        }
        self.map(|p| p / sum)
    }

    /// Every component pushed through [`safe_prob`].
    pub fn clamped(self) -> Self {
        self.map(safe_prob)
    }
}

pub fn classify_outcome(home_goals: u8, away_goals: u8) -> Outcome {
    if home_goals > away_goals {
        Outcome::Home
    } else if home_goals < away_goals {
        Outcome::Away
    } else {
        Outcome::Draw
    }
}

/// Shrinks a model probability toward the three-way uniform prior.
///
/// `alpha = 1` keeps the model untouched, `alpha = 0` returns exactly 1/3.
pub fn shrink_to_uniform(p: f64, alpha: f64) -> f64 {
    alpha * p + (1.0 - alpha) * UNIFORM_3WAY
}

pub fn calibrate(p: Prob3, alpha: f64) -> Prob3 {
    p.map(|v| shrink_to_uniform(v, alpha))
}

/// Keeps a probability strictly inside (0, 1) so logs and logits stay finite.
pub fn safe_prob(p: f64) -> f64 {
    if !p.is_finite() {
        return UNIFORM_3WAY;
    }
    p.clamp(PROB_EPS, 1.0 - PROB_EPS)
}

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

pub fn one_hot(outcome: Outcome) -> Prob3 {
    match outcome {
        Outcome::Home => Prob3::new(1.0, 0.0, 0.0),
        Outcome::Draw => Prob3::new(0.0, 1.0, 0.0),
        Outcome::Away => Prob3::new(0.0, 0.0, 1.0),
    }
}
