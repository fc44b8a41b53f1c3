use std::collections::HashMap;

use crate::historical_dataset::MatchRecord;

pub const DEFAULT_SHRINK_K: f64 = 8.0;

// Laplace-style offset keeps ln() finite for goalless sides; the divisor centres the
// increment on a league-average scoring rate.
const GOAL_SMOOTHING: f64 = 0.5;
const GOAL_CENTER: f64 = 1.4;

/// Cumulative log-scale ratings for one team. Cold start is all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeamState {
    pub attack: f64,
    pub defense: f64,
    pub matches: u32,
}

/// Shrinkage-weighted view of a [`TeamState`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Strength {
    pub attack: f64,
    pub defense: f64,
}

pub fn shrinkage_weight(matches: u32, k: f64) -> f64 {
    let n = matches as f64;
    if n <= 0.0 {
        return 0.0;
    }
    n / (n + k)
}

pub fn effective_strength(state: &TeamState, k: f64) -> Strength {
    let w = shrinkage_weight(state.matches, k);
    Strength {
        attack: w * state.attack,
        defense: w * state.defense,
    }
}

fn goal_increment(goals: u8) -> f64 {
    ((goals as f64 + GOAL_SMOOTHING) / GOAL_CENTER).ln()
}

/// Team states for one evaluation step, keyed by team id.
#[derive(Debug, Clone, Default)]
pub struct TeamStates {
    teams: HashMap<String, TeamState>,
}

impl TeamStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays `matches` in order from an empty map.
    pub fn from_matches(matches: &[MatchRecord]) -> Self {
        let mut states = Self::new();
        for m in matches {
            states.update(m);
        }
        states
    }

    /// Folds one completed match into both sides. The match counter moves first so the
    /// next query already weights by the post-match count.
    pub fn update(&mut self, m: &MatchRecord) {
        let home = self.teams.entry(m.home.clone()).or_default();
        home.matches += 1;
        home.attack += goal_increment(m.home_goals);
        home.defense += goal_increment(m.away_goals);

        let away = self.teams.entry(m.away.clone()).or_default();
        away.matches += 1;
        away.attack += goal_increment(m.away_goals);
        away.defense += goal_increment(m.home_goals);
    }

    pub fn get(&self, team: &str) -> Option<&TeamState> {
        self.teams.get(team)
    }

    pub fn strength(&self, team: &str, k: f64) -> Option<Strength> {
        self.get(team).map(|s| effective_strength(s, k))
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}
