pub mod backtest;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod context_edge;
pub mod fake_season;
pub mod historical_dataset;
pub mod league_params;
pub mod logging;
pub mod markets;
pub mod metrics;
pub mod odds;
pub mod report;
pub mod team_strength;
pub mod win_prob;
