use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use matchlab_engine::backtest;
use matchlab_engine::config::EngineConfig;
use matchlab_engine::context_edge;
use matchlab_engine::fake_season::{self, FakeSeasonConfig};
use matchlab_engine::league_params::LeaguePriors;
use matchlab_engine::team_strength::TeamStates;
use matchlab_engine::win_prob::{self, ScoreGrid};

fn bench_outcome_probs(c: &mut Criterion) {
    c.bench_function("outcome_probs_k10", |b| {
        b.iter(|| {
            let p = win_prob::outcome_probs(black_box(1.55), black_box(1.12), 10);
            black_box(p.home);
        })
    });
}

fn bench_score_grid_markets(c: &mut Criterion) {
    c.bench_function("score_grid_markets", |b| {
        b.iter(|| {
            let markets = ScoreGrid::new(black_box(1.55), black_box(1.12), 10).markets();
            black_box(markets.len());
        })
    });
}

fn bench_team_state_rebuild(c: &mut Criterion) {
    let season = fake_season::generate(&FakeSeasonConfig::default());
    c.bench_function("team_states_from_season", |b| {
        b.iter(|| {
            let teams = TeamStates::from_matches(black_box(&season));
            black_box(teams.len());
        })
    });
}

fn bench_rolling_backtest(c: &mut Criterion) {
    let season = fake_season::generate(&FakeSeasonConfig::default());
    let priors = LeaguePriors::default();
    let cfg = EngineConfig::default();
    let mut group = c.benchmark_group("rolling");
    group.sample_size(10);
    group.bench_function("backtest_one_season", |b| {
        b.iter(|| {
            let report = backtest::run_backtest(black_box(&season), &priors, &cfg);
            black_box(report.evaluated);
        })
    });
    group.bench_function("max_edge_sweep_one_season", |b| {
        b.iter(|| {
            let report = context_edge::run_edge_sweep(black_box(&season), &priors, &cfg);
            black_box(report.evaluated);
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_outcome_probs,
    bench_score_grid_markets,
    bench_team_state_rebuild,
    bench_rolling_backtest
);
criterion_main!(benches);
