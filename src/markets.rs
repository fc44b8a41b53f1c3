use serde::{Deserialize, Serialize};

/// Goal lines priced by the over/under market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OuLine {
    #[serde(rename = "1.5")]
    L15,
    #[serde(rename = "2.5")]
    L25,
    #[serde(rename = "3.5")]
    L35,
}

pub const OU_LINES: [OuLine; 3] = [OuLine::L15, OuLine::L25, OuLine::L35];

impl OuLine {
    pub fn value(self) -> f64 {
        match self {
            OuLine::L15 => 1.5,
            OuLine::L25 => 2.5,
            OuLine::L35 => 3.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Market {
    OneXTwo,
    DoubleChance,
    BothTeamsScore,
    OverUnder(OuLine),
}

impl Market {
    pub fn key(self) -> &'static str {
        match self {
            Market::OneXTwo => "1X2",
            Market::DoubleChance => "DC",
            Market::BothTeamsScore => "GG",
            Market::OverUnder(OuLine::L15) => "OU15",
            Market::OverUnder(OuLine::L25) => "OU25",
            Market::OverUnder(OuLine::L35) => "OU35",
        }
    }

    /// Parses the feed's market keys (`1X2`, `DC`, `GG`, `OU25`, ...).
    pub fn from_key(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1X2" => Some(Market::OneXTwo),
            "DC" => Some(Market::DoubleChance),
            "GG" | "BTTS" => Some(Market::BothTeamsScore),
            "OU15" => Some(Market::OverUnder(OuLine::L15)),
            "OU25" => Some(Market::OverUnder(OuLine::L25)),
            "OU35" => Some(Market::OverUnder(OuLine::L35)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    Home,
    Draw,
    Away,
    HomeOrDraw,
    HomeOrAway,
    DrawOrAway,
    Yes,
    No,
    Over,
    Under,
}

impl Selection {
    pub fn from_key(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "1" => Some(Selection::Home),
            "draw" | "x" => Some(Selection::Draw),
            "away" | "2" => Some(Selection::Away),
            "1x" => Some(Selection::HomeOrDraw),
            "12" => Some(Selection::HomeOrAway),
            "x2" => Some(Selection::DrawOrAway),
            "yes" => Some(Selection::Yes),
            "no" => Some(Selection::No),
            "over" => Some(Selection::Over),
            "under" => Some(Selection::Under),
            _ => None,
        }
    }
}

/// Model probabilities for one market of one fixture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "market", rename_all = "snake_case")]
pub enum MarketProbs {
    OneXTwo {
        home: f64,
        draw: f64,
        away: f64,
    },
    DoubleChance {
        home_or_draw: f64,
        home_or_away: f64,
        draw_or_away: f64,
    },
    BothTeamsScore {
        yes: f64,
        no: f64,
    },
    OverUnder {
        line: OuLine,
        over: f64,
        under: f64,
    },
}

impl MarketProbs {
    pub fn market(&self) -> Market {
        match self {
            MarketProbs::OneXTwo { .. } => Market::OneXTwo,
            MarketProbs::DoubleChance { .. } => Market::DoubleChance,
            MarketProbs::BothTeamsScore { .. } => Market::BothTeamsScore,
            MarketProbs::OverUnder { line, .. } => Market::OverUnder(*line),
        }
    }

    pub fn selections(&self) -> &'static [Selection] {
        match self {
            MarketProbs::OneXTwo { .. } => &[Selection::Home, Selection::Draw, Selection::Away],
            MarketProbs::DoubleChance { .. } => &[
                Selection::HomeOrDraw,
                Selection::HomeOrAway,
                Selection::DrawOrAway,
            ],
            MarketProbs::BothTeamsScore { .. } => &[Selection::Yes, Selection::No],
            MarketProbs::OverUnder { .. } => &[Selection::Over, Selection::Under],
        }
    }

    /// Probability of `selection`, or `None` when the selection does not belong to
    /// this market.
    pub fn probability(&self, selection: Selection) -> Option<f64> {
        match (*self, selection) {
            (MarketProbs::OneXTwo { home, .. }, Selection::Home) => Some(home),
            (MarketProbs::OneXTwo { draw, .. }, Selection::Draw) => Some(draw),
            (MarketProbs::OneXTwo { away, .. }, Selection::Away) => Some(away),
            (MarketProbs::DoubleChance { home_or_draw, .. }, Selection::HomeOrDraw) => {
                Some(home_or_draw)
            }
            (MarketProbs::DoubleChance { home_or_away, .. }, Selection::HomeOrAway) => {
                Some(home_or_away)
            }
            (MarketProbs::DoubleChance { draw_or_away, .. }, Selection::DrawOrAway) => {
                Some(draw_or_away)
            }
            (MarketProbs::BothTeamsScore { yes, .. }, Selection::Yes) => Some(yes),
            (MarketProbs::BothTeamsScore { no, .. }, Selection::No) => Some(no),
            (MarketProbs::OverUnder { over, .. }, Selection::Over) => Some(over),
            (MarketProbs::OverUnder { under, .. }, Selection::Under) => Some(under),
            _ => None,
        }
    }
}

/// Looks up `(market, selection)` across a fixture's priced markets.
pub fn probability_for(markets: &[MarketProbs], market: Market, selection: Selection) -> Option<f64> {
    markets
        .iter()
        .find(|m| m.market() == market)
        .and_then(|m| m.probability(selection))
}
