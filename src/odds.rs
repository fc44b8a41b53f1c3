use crate::calibration::Prob3;
use crate::historical_dataset::MarketOdds;

/// Removes the bookmaker margin from a decimal 1X2 quote.
///
/// Returns `None` when a leg is missing or not a valid decimal price (≤ 1.0).
pub fn implied_probs(
    odds_home: Option<f64>,
    odds_draw: Option<f64>,
    odds_away: Option<f64>,
) -> Option<Prob3> {
    let valid = |o: Option<f64>| o.filter(|v| v.is_finite() && *v > 1.0);
    let home = valid(odds_home)?;
    let draw = valid(odds_draw)?;
    let away = valid(odds_away)?;

    let ih = 1.0 / home;
    let id = 1.0 / draw;
    let ia = 1.0 / away;
    let sum = ih + id + ia;
    if sum <= 0.0 {
        return None;
    }
    Some(Prob3::new(ih / sum, id / sum, ia / sum))
}

pub fn implied_from(odds: &MarketOdds) -> Option<Prob3> {
    implied_probs(odds.home, odds.draw, odds.away)
}

/// Sum of raw reciprocals minus one; the bookmaker's margin on the quote.
pub fn overround(odds: &MarketOdds) -> Option<f64> {
    let (Some(h), Some(d), Some(a)) = (odds.home, odds.draw, odds.away) else {
        return None;
    };
    if h <= 1.0 || d <= 1.0 || a <= 1.0 {
        return None;
    }
    Some(1.0 / h + 1.0 / d + 1.0 / a - 1.0)
}
