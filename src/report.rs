use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::backtest::BacktestReport;
use crate::context_edge::SweepReport;
use crate::metrics::BucketReport;

/// Pretty JSON written to a sibling temp file, then swapped into place.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report dir {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(value).context("serialize report")?;
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn opt4(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"))
}

fn bucket_line(label: &str, b: &BucketReport) -> String {
    format!(
        "{label} samples={} brier={} logloss={} ece={}",
        b.samples,
        opt4(b.brier),
        opt4(b.logloss),
        opt4(b.ece)
    )
}

pub fn format_backtest_summary(report: &BacktestReport) -> String {
    let mut out = String::new();
    let s = &report.skipped;
    let _ = writeln!(
        out,
        "matches={} warmup={} evaluated={} skipped: cold_start={} non_finite={} missing_odds={}",
        report.matches,
        report.warmup,
        report.evaluated,
        s.cold_start,
        s.non_finite_rate,
        s.missing_odds
    );
    let _ = writeln!(out, "{}", bucket_line("model", &report.model.global));
    let _ = writeln!(out, "{}", bucket_line("raw  ", &report.raw.global));
    if let Some(market) = &report.market {
        let _ = writeln!(out, "{}", bucket_line("market", &market.global));
    }
    for (league, b) in &report.model.leagues {
        let _ = writeln!(out, "{}", bucket_line(&format!("  {league}"), b));
    }
    out
}

/// Threshold sweep as the `tau | bets | hit% | avgOdds | ROI | kellyROI` table, followed by the
/// best leagues per threshold when a breakdown is present.
pub fn format_sweep_table(report: &SweepReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} sweep: matches={} evaluated={} skipped={}",
        report.variant,
        report.matches,
        report.evaluated,
        report.skipped.total()
    );
    if report.out_of_band > 0 {
        let _ = writeln!(out, "out of odds band: {}", report.out_of_band);
    }
    let _ = writeln!(out, "tau  | bets | hit%  | avgOdds | ROI | kellyROI");
    for row in &report.thresholds {
        match (row.hit_rate, row.avg_odds, row.roi) {
            (Some(hit), Some(avg), Some(roi)) => {
                let kelly = row
                    .kelly_roi
                    .map_or_else(|| "-".to_string(), |k| format!("{:.2}%", k * 100.0));
                let _ = writeln!(
                    out,
                    "{:.2} | {} | {:.1}% | {:.2} | {:.2}% | {kelly}",
                    row.threshold,
                    row.bets,
                    hit * 100.0,
                    avg,
                    roi * 100.0
                );
            }
            _ => {
                let _ = writeln!(out, "{:.2} | 0 | - | - | - | -", row.threshold);
            }
        }
    }

    for row in report.thresholds.iter().filter(|r| !r.leagues.is_empty()) {
        let mut leagues: Vec<_> = row.leagues.iter().collect();
        leagues.sort_by(|a, b| b.1.roi().total_cmp(&a.1.roi()));
        let _ = writeln!(out, "tau = {:.2}", row.threshold);
        for (league, l) in leagues.into_iter().take(5) {
            let _ = writeln!(
                out,
                "  {league}: bets={}, ROI={:.2}%",
                l.bets,
                l.roi() * 100.0
            );
        }
    }
    out
}
