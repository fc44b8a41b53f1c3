use std::path::PathBuf;

use matchlab_engine::config::EngineConfig;
use matchlab_engine::context_edge::{self, ContextSignal, OddsBand, OddsBands, SweepReport};
use matchlab_engine::fake_season::{self, FakeSeasonConfig};
use matchlab_engine::historical_dataset::{self, MatchRecord};
use matchlab_engine::league_params::LeaguePriors;

fn archive() -> Vec<MatchRecord> {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("archive");
    historical_dataset::import_archive_root(&path).expect("fixture archive should import")
}

fn assert_consistent(report: &SweepReport) {
    assert_eq!(report.thresholds.len(), 5);
    for pair in report.thresholds.windows(2) {
        assert!(pair[0].threshold < pair[1].threshold);
        assert!(pair[0].bets >= pair[1].bets, "bets must shrink as tau grows");
    }
    for row in &report.thresholds {
        assert!(row.bets <= report.evaluated);
        assert!(row.wins <= row.bets);
        match row.roi {
            Some(roi) => assert!((roi * row.bets as f64 - row.profit).abs() < 1e-9),
            None => assert_eq!(row.bets, 0),
        }
        // Default Kelly cap is 5% of bankroll per bet.
        assert!(row.kelly.staked <= row.bets as f64 * 0.05 + 1e-12);
        assert!(row.kelly.profit >= -row.kelly.staked - 1e-12);
        assert_eq!(row.kelly_roi.is_some(), row.kelly.staked > 0.0);
    }
}

#[test]
fn max_edge_sweep_on_fixture_archive() {
    let rows = archive();
    let report = context_edge::run_edge_sweep(&rows, &LeaguePriors::default(), &EngineConfig::default());
    assert_eq!(report.variant, "max_edge");
    assert_eq!(report.evaluated, 4);
    assert_eq!(report.skipped.cold_start, 3);
    assert_consistent(&report);
    // Far below the 50-bet breakdown gate.
    assert!(report.thresholds.iter().all(|t| t.leagues.is_empty()));
}

#[test]
fn league_breakdown_respects_gate() {
    let rows = fake_season::generate(&FakeSeasonConfig::default());
    let cfg = EngineConfig {
        min_league_bets: 1,
        ..EngineConfig::default()
    };
    let report = context_edge::run_edge_sweep(&rows, &LeaguePriors::default(), &cfg);
    assert_consistent(&report);
    for row in report.thresholds.iter().filter(|t| t.bets > 0) {
        assert_eq!(row.leagues["ENG1"].bets, row.bets);
        assert!((row.leagues["ENG1"].profit - row.profit).abs() < 1e-9);
    }
}

#[test]
fn odds_bands_restrict_max_edge_bets() {
    let rows = fake_season::generate(&FakeSeasonConfig::default());
    let priors = LeaguePriors::default();
    let open = context_edge::run_edge_sweep(&rows, &priors, &EngineConfig::default());
    let home_only = EngineConfig {
        odds_bands: Some(OddsBands {
            home: Some(OddsBand { min: 1.9, max: 2.8 }),
            draw: None,
            away: None,
        }),
        ..EngineConfig::default()
    };
    let banded = context_edge::run_edge_sweep(&rows, &priors, &home_only);

    assert_eq!(open.out_of_band, 0);
    assert_eq!(banded.evaluated, open.evaluated);
    assert!(banded.out_of_band > 0);
    assert_consistent(&banded);
    for (b, o) in banded.thresholds.iter().zip(&open.thresholds) {
        assert!(b.bets <= o.bets);
        if let Some(avg) = b.avg_odds {
            assert!((1.9..=2.8).contains(&avg), "avg odds {avg} outside the home band");
        }
    }
}

#[test]
fn rest_sweep_accounts_for_every_fixture() {
    let rows = archive();
    let report = context_edge::run_context_sweep(
        &rows,
        ContextSignal::Rest,
        &LeaguePriors::default(),
        &EngineConfig::default(),
    );
    assert_eq!(report.variant, "rest");
    assert_eq!(report.evaluated + report.skipped.total(), rows.len() - 10);
    assert_consistent(&report);
}

#[test]
fn congestion_sweep_skips_level_loads() {
    // Weekly rounds keep most loads level, so many fixtures carry no context.
    let rows = fake_season::generate(&FakeSeasonConfig {
        teams: 8,
        ..FakeSeasonConfig::default()
    });
    let report = context_edge::run_context_sweep(
        &rows,
        ContextSignal::Congestion,
        &LeaguePriors::default(),
        &EngineConfig::default(),
    );
    assert_eq!(report.evaluated + report.skipped.total(), rows.len() - 10);
    assert!(report.skipped.undefined_context > 0);
    assert_consistent(&report);
}

#[test]
fn missing_odds_are_skipped_before_context() {
    let mut rows = archive();
    for r in rows.iter_mut() {
        r.odds = Default::default();
    }
    let report = context_edge::run_context_sweep(
        &rows,
        ContextSignal::Congestion,
        &LeaguePriors::default(),
        &EngineConfig::default(),
    );
    assert_eq!(report.evaluated, 0);
    assert_eq!(report.skipped.missing_odds, 7);
    assert!(report.thresholds.iter().all(|t| t.bets == 0 && t.roi.is_none()));
}
