use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use matchlab_engine::calibration::Outcome;
use matchlab_engine::historical_dataset::{self, ImportError};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn imports_archive_in_date_order() {
    let rows = historical_dataset::import_archive_root(&fixture_path("archive"))
        .expect("fixture archive should import");
    // The GER1 row without goals is dropped.
    assert_eq!(rows.len(), 17);
    assert!(rows.windows(2).all(|w| w[0].date <= w[1].date));

    let first = &rows[0];
    assert_eq!(first.league, "ENG1");
    assert_eq!(first.season, "2223");
    assert_eq!(first.date, date(2022, 8, 5));
    assert_eq!((first.home.as_str(), first.away.as_str()), ("Arsenal", "Chelsea"));
    assert_eq!(first.outcome(), Outcome::Home);
    assert_eq!(first.odds.home, Some(2.10));

    let last = rows.last().unwrap();
    assert_eq!(last.league, "GER1");
    assert_eq!(last.season, "2324");
    assert_eq!(last.date, date(2023, 8, 26));
}

#[test]
fn two_digit_years_and_average_odds_fallback() {
    let rows = historical_dataset::import_league_folder(&fixture_path("archive/GER1"), "GER1")
        .expect("league folder should import");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, date(2023, 8, 18));

    let leipzig = rows.iter().find(|r| r.home == "Leipzig").unwrap();
    assert_eq!(leipzig.odds.home, Some(1.55));
    assert_eq!(leipzig.odds.draw, Some(4.30));
    assert_eq!(leipzig.odds.away, Some(5.60));
    assert!(!rows.iter().any(|r| r.home == "Koln"));
}

#[test]
fn league_helpers_split_the_archive() {
    let rows = historical_dataset::import_archive_root(&fixture_path("archive")).unwrap();
    assert_eq!(historical_dataset::league_ids(&rows), vec!["ENG1", "GER1"]);
    assert_eq!(historical_dataset::filter_league(&rows, "GER1").len(), 3);
    assert!(historical_dataset::filter_league(&rows, "SPA1").is_empty());
}

#[test]
fn missing_goal_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let league = dir.path().join("ITA1");
    fs::create_dir_all(&league).unwrap();
    fs::write(
        league.join("I1_2324.csv"),
        "Div,Date,HomeTeam,AwayTeam,FTHG\nI1,19/08/2023,Roma,Milan,1\n",
    )
    .unwrap();

    let err = historical_dataset::import_archive_root(dir.path()).unwrap_err();
    assert!(matches!(err, ImportError::MissingColumn { column: "FTAG", .. }));
}

#[test]
fn bad_date_cell_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("F1_2324.csv");
    fs::write(
        &path,
        "Date,HomeTeam,AwayTeam,FTHG,FTAG\n2023-08-19,Lyon,Nice,1,0\n",
    )
    .unwrap();

    let err = historical_dataset::import_football_data_csv(&path, "FRA1", "2324").unwrap_err();
    match err {
        ImportError::InvalidDate { line, value, .. } => {
            assert_eq!(line, 2);
            assert_eq!(value, "2023-08-19");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_archive_root_is_an_io_error() {
    let err = historical_dataset::import_archive_root(&fixture_path("no_such_archive")).unwrap_err();
    assert!(matches!(err, ImportError::Io { .. }));
}
